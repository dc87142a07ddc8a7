//! OpenAI Chat Completions API provider (streaming, with tool calling).

use std::str::FromStr;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::RelayError;
use crate::types::*;

use super::http::{bearer_headers, parse_sse_line, shared_client, status_to_error, LineBuffer, SseLine};
use super::{ModelProvider, ProviderRequest};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    model: String,
    api_key: String,
    base_url: String,
}

impl OpenAiProvider {
    pub fn new(model: impl Into<String>, api_key: impl Into<String>, base_url: Option<String>) -> Self {
        let base_url = base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        Self {
            model: model.into(),
            api_key: api_key.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn build_request_body(&self, request: &ProviderRequest) -> Value {
        let messages: Vec<Value> = request.messages.iter().map(message_to_openai).collect();

        let mut body = serde_json::Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert("messages".into(), Value::Array(messages));
        body.insert("stream".into(), Value::Bool(true));

        if let Some(max) = request.settings.max_tokens {
            body.insert("max_tokens".into(), max.into());
        }
        if let Some(temp) = request.settings.temperature {
            body.insert("temperature".into(), temp.into());
        }
        if let Some(top_p) = request.settings.top_p {
            body.insert("top_p".into(), top_p.into());
        }
        if let Some(ref user) = request.settings.user {
            body.insert("user".into(), user.clone().into());
        }

        if let Some(tools) = request.tools.as_ref().filter(|tools| !tools.is_empty()) {
            let tool_defs: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body.insert("tools".into(), tool_defs.into());
            body.insert("tool_choice".into(), json!("auto"));
        }

        Value::Object(body)
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn provider_name(&self) -> &str {
        "openai"
    }

    fn model_id(&self) -> &str {
        &self.model
    }

    async fn stream_completion(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk, RelayError>>, RelayError> {
        let body = self.build_request_body(request);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, tools = request.has_tools(), "OpenAI stream_completion");

        let resp = shared_client()
            .post(&url)
            .headers(bearer_headers(&self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(status_to_error(status, &body_text));
        }

        let byte_stream = resp.bytes_stream();

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::default();
            futures::pin_mut!(byte_stream);

            'outer: loop {
                let next = byte_stream.next().await;
                let ended = match next {
                    Some(Ok(bytes)) => {
                        lines.push(&bytes);
                        false
                    }
                    Some(Err(e)) => {
                        yield Err(RelayError::Network(e));
                        break;
                    }
                    None => true,
                };

                let mut pending = Vec::new();
                while let Some(line) = lines.next_line() {
                    pending.push(line);
                }
                if ended {
                    pending.extend(lines.finish());
                }

                for line in pending {
                    match parse_sse_line(&line) {
                        SseLine::Ignored => continue,
                        SseLine::Done => break 'outer,
                        SseLine::Data(data) => match parse_stream_data(data) {
                            Ok(Some(chunk)) => {
                                yield Ok(chunk);
                            }
                            Ok(None) => {}
                            Err(err) => {
                                warn!(error = %err, "malformed OpenAI stream chunk");
                                yield Err(err);
                                break 'outer;
                            }
                        },
                    }
                }

                if ended {
                    break;
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Decode one SSE `data:` payload. `Ok(None)` for chunks with no choices
/// (usage-only trailers).
fn parse_stream_data(data: &str) -> Result<Option<StreamChunk>, RelayError> {
    let chunk: OpenAiStreamChunk = serde_json::from_str(data)
        .map_err(|e| RelayError::Stream(format!("invalid chunk: {e}")))?;

    if let Some(error) = chunk.error {
        return Err(RelayError::Provider {
            provider: "openai".into(),
            message: error.message.unwrap_or_else(|| "stream error".into()),
        });
    }

    let Some(choice) = chunk.choices.into_iter().next() else {
        return Ok(None);
    };
    let delta = choice.delta.unwrap_or_default();

    let tool_calls = delta
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            let function = tc.function.unwrap_or_default();
            ToolCallFragment {
                index: tc.index,
                id: tc.id,
                name: function.name,
                arguments: function.arguments,
            }
        })
        .collect();

    Ok(Some(StreamChunk {
        role: delta.role.as_deref().and_then(parse_role),
        content: delta.content,
        tool_calls,
        finish_reason: choice
            .finish_reason
            .as_deref()
            .and_then(|reason| FinishReason::from_str(reason).ok()),
    }))
}

fn parse_role(role: &str) -> Option<Role> {
    match role {
        "system" | "developer" => Some(Role::System),
        "user" => Some(Role::User),
        "assistant" => Some(Role::Assistant),
        "tool" => Some(Role::Tool),
        _ => None,
    }
}

fn message_to_openai(msg: &ModelMessage) -> Value {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    };

    if let Some(result) = msg.tool_result_part() {
        return json!({
            "role": "tool",
            "tool_call_id": result.tool_call_id,
            "content": result.result.to_string(),
        });
    }

    let tool_calls = msg.tool_calls();
    if !tool_calls.is_empty() {
        let tc_json: Vec<Value> = tool_calls
            .iter()
            .map(|tc| {
                json!({
                    "id": tc.id,
                    "type": "function",
                    "function": {
                        "name": tc.name,
                        "arguments": tc.arguments.to_string(),
                    }
                })
            })
            .collect();
        let text = msg.text();
        return json!({
            "role": role,
            "content": if text.is_empty() { Value::Null } else { Value::String(text) },
            "tool_calls": tc_json,
        });
    }

    json!({ "role": role, "content": msg.text() })
}

// OpenAI API stream types (internal)

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
    error: Option<OpenAiError>,
}

#[derive(Deserialize)]
struct OpenAiError {
    message: Option<String>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: Option<OpenAiStreamDelta>,
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct OpenAiStreamDelta {
    role: Option<String>,
    content: Option<String>,
    tool_calls: Option<Vec<OpenAiToolCallDelta>>,
}

#[derive(Deserialize)]
struct OpenAiToolCallDelta {
    index: u32,
    id: Option<String>,
    function: Option<OpenAiFunctionDelta>,
}

#[derive(Deserialize, Default)]
struct OpenAiFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}
