//! Seams to the component that actually runs tools.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use strum::{Display, EnumString};

use super::types::ToolSchema;
use crate::error::RelayError;

/// What a running tool asks the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElicitationPrompt {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_schema: Option<Value>,
}

impl ElicitationPrompt {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            requested_schema: None,
        }
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.requested_schema = Some(schema);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
enum ActionKind {
    Accept,
    Decline,
    Cancel,
}

/// The user's answer as handed back to the tool.
#[derive(Debug, Clone, PartialEq)]
pub enum ElicitationAction {
    Accept { content: Option<Value> },
    Decline,
    Cancel,
}

impl ElicitationAction {
    /// Map a raw client response onto an action.
    ///
    /// `{"action": "accept" | "decline" | "cancel", "content": ...}` is honoured
    /// as written; any other payload is accepted content.
    pub fn from_response(response: Value) -> Self {
        let kind = response
            .get("action")
            .and_then(Value::as_str)
            .and_then(|action| ActionKind::from_str(action).ok());

        match kind {
            Some(ActionKind::Accept) => Self::Accept {
                content: response.get("content").cloned(),
            },
            Some(ActionKind::Decline) => Self::Decline,
            Some(ActionKind::Cancel) => Self::Cancel,
            None => Self::Accept {
                content: Some(response),
            },
        }
    }

    pub fn is_accept(&self) -> bool {
        matches!(self, Self::Accept { .. })
    }

    /// Accepted content, if any.
    pub fn content(&self) -> Option<&Value> {
        match self {
            Self::Accept { content } => content.as_ref(),
            _ => None,
        }
    }

    /// Wire form: `{"action": ..., "content": ...}`.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Accept { content: Some(content) } => {
                json!({"action": ActionKind::Accept.to_string(), "content": content})
            }
            Self::Accept { content: None } => json!({"action": ActionKind::Accept.to_string()}),
            Self::Decline => json!({"action": ActionKind::Decline.to_string()}),
            Self::Cancel => json!({"action": ActionKind::Cancel.to_string()}),
        }
    }
}

/// Raw output of a tool call, before result extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutorOutput {
    pub structured_content: Option<Value>,
    pub text_content: Vec<String>,
}

impl ExecutorOutput {
    pub fn structured(value: Value) -> Self {
        Self {
            structured_content: Some(value),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text_content: vec![text.into()],
            ..Default::default()
        }
    }

    /// Reduce the output to one JSON payload.
    ///
    /// Structured content wins, then the first text item that parses as JSON,
    /// then `{"result": <text>}`.
    pub fn into_payload(self) -> Value {
        if let Some(structured) = self.structured_content.filter(|v| !is_empty_value(v)) {
            return structured;
        }
        if let Some(parsed) = self
            .text_content
            .iter()
            .find_map(|text| serde_json::from_str::<Value>(text).ok())
        {
            return parsed;
        }
        json!({ "result": self.text_content.join("\n") })
    }
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Callback a tool uses to ask the user something mid-call.
#[async_trait]
pub trait ElicitationHook: Send + Sync {
    async fn elicit(&self, prompt: ElicitationPrompt) -> ElicitationAction;
}

/// Hook for callers that cannot elicit: every prompt is cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoElicitation;

#[async_trait]
impl ElicitationHook for NoElicitation {
    async fn elicit(&self, _prompt: ElicitationPrompt) -> ElicitationAction {
        ElicitationAction::Cancel
    }
}

/// Something that can list and run tools.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Short label for logs and `/health`.
    fn name(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, RelayError>;

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        hook: Arc<dyn ElicitationHook>,
    ) -> Result<ExecutorOutput, RelayError>;

    /// Healthy means at least one tool is listed.
    async fn health_check(&self) -> bool {
        matches!(self.list_tools().await, Ok(tools) if !tools.is_empty())
    }
}
