//! The session state machine: stream, invoke tools, follow up, end.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

use super::accumulator::{PendingToolCall, ToolCallAccumulator};
use super::events::OutboundEvent;
use crate::error::RelayError;
use crate::provider::{ModelProvider, ProviderRequest, ToolDefinition};
use crate::tools::{EventSink, ToolCatalog, ToolInvoker, ToolResult};
use crate::types::{FinishReason, GenerationSettings, ModelMessage, Role, SessionId};

/// Stream of outbound events. An `Err` item ends the sequence without `StreamEnd`.
pub type OutboundStream = BoxStream<'static, Result<OutboundEvent, RelayError>>;

/// Drives one chat turn through at most one round of tool calls.
#[derive(Clone)]
pub struct StreamOrchestrator {
    provider: Arc<dyn ModelProvider>,
    invoker: ToolInvoker,
    catalog: Arc<ToolCatalog>,
    settings: GenerationSettings,
    system_prompt: Option<String>,
}

impl StreamOrchestrator {
    pub fn new(provider: Arc<dyn ModelProvider>, invoker: ToolInvoker, catalog: Arc<ToolCatalog>) -> Self {
        Self {
            provider,
            invoker,
            catalog,
            settings: GenerationSettings::default(),
            system_prompt: None,
        }
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Prepended to every conversation that does not open with a system message.
    pub fn with_system_prompt(mut self, prompt: Option<String>) -> Self {
        self.system_prompt = prompt.filter(|p| !p.trim().is_empty());
        self
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// Run one turn under a fresh session id.
    pub fn stream(&self, messages: Vec<ModelMessage>) -> OutboundStream {
        self.stream_session(messages, SessionId::new())
    }

    pub fn stream_session(&self, messages: Vec<ModelMessage>, session: SessionId) -> OutboundStream {
        Box::pin(run_session(self.clone(), self.prepare_history(messages), session))
    }

    fn prepare_history(&self, mut messages: Vec<ModelMessage>) -> Vec<ModelMessage> {
        let opens_with_system = messages.first().is_some_and(|m| m.role == Role::System);
        if let (Some(prompt), false) = (&self.system_prompt, opens_with_system) {
            messages.insert(0, ModelMessage::system(prompt.clone()));
        }
        messages
    }
}

impl std::fmt::Debug for StreamOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamOrchestrator")
            .field("provider", &self.provider.provider_name())
            .field("model", &self.provider.model_id())
            .field("invoker", &self.invoker)
            .finish_non_exhaustive()
    }
}

fn run_session(
    orchestrator: StreamOrchestrator,
    mut history: Vec<ModelMessage>,
    session: SessionId,
) -> impl Stream<Item = Result<OutboundEvent, RelayError>> + Send + 'static {
    async_stream::try_stream! {
        info!(session = %session, messages = history.len(), "session started");

        let tools: Vec<ToolDefinition> = orchestrator
            .catalog
            .tools()
            .await
            .iter()
            .map(ToolDefinition::from)
            .collect();
        let request = ProviderRequest {
            messages: history.clone(),
            settings: orchestrator.settings.clone(),
            tools: (!tools.is_empty()).then_some(tools),
        };

        let mut chunks = orchestrator.provider.stream_completion(&request).await?;
        let mut accumulator = ToolCallAccumulator::new();
        let mut text = String::new();
        let mut finish_reason = None;

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                text.push_str(&content);
                yield OutboundEvent::delta(content);
            }
            for fragment in chunk.tool_calls {
                accumulator.push(fragment);
            }
            if chunk.finish_reason.is_some() {
                finish_reason = chunk.finish_reason;
            }
        }
        drop(chunks);

        if finish_reason == Some(FinishReason::ToolCalls) && !accumulator.is_empty() {
            let calls = accumulator.finish();
            debug!(session = %session, count = calls.len(), "model requested tool calls");
            history.push(ModelMessage::assistant_tool_calls(
                text,
                calls.iter().map(PendingToolCall::to_agent_call).collect(),
            ));

            for call in calls {
                yield OutboundEvent::ToolStarted {
                    name: call.name.clone(),
                    args: Value::Object(call.arguments.clone()),
                };

                let (events_tx, mut events_rx) = mpsc::unbounded_channel();
                let sink: EventSink = Arc::new(move |event| {
                    let _ = events_tx.send(event);
                });
                let mut task = AbortOnDrop(tokio::spawn({
                    let invoker = orchestrator.invoker.clone();
                    let session = session.clone();
                    let name = call.name.clone();
                    let arguments = call.arguments.clone();
                    async move { invoker.invoke(&name, arguments, &session, sink).await }
                }));

                let joined = loop {
                    let step = tokio::select! {
                        biased;
                        Some(event) = events_rx.recv() => Step::Event(event),
                        joined = &mut task.0 => Step::Finished(joined),
                    };
                    match step {
                        Step::Event(event) => {
                            yield event;
                        }
                        Step::Finished(joined) => break joined,
                    }
                };
                while let Ok(event) = events_rx.try_recv() {
                    yield event;
                }

                let result = task_result(&call.name, joined);
                let payload = result.payload();
                info!(session = %session, tool = %call.name, is_error = result.is_error(), "tool finished");
                yield OutboundEvent::ToolResult {
                    name: call.name.clone(),
                    result: payload.clone(),
                };
                history.push(ModelMessage::tool_result(call.id, payload, result.is_error()));
            }

            let follow_up = ProviderRequest {
                messages: history,
                settings: orchestrator.settings.clone(),
                tools: None,
            };
            let mut chunks = orchestrator.provider.stream_completion(&follow_up).await?;
            while let Some(chunk) = chunks.next().await {
                let chunk = chunk?;
                if let Some(content) = chunk.content.filter(|c| !c.is_empty()) {
                    yield OutboundEvent::delta(content);
                }
                if !chunk.tool_calls.is_empty() {
                    debug!(session = %session, "ignoring tool calls in follow-up completion");
                }
            }
        }

        info!(session = %session, "session complete");
        yield OutboundEvent::StreamEnd;
    }
}

enum Step {
    Event(OutboundEvent),
    Finished(Result<ToolResult, JoinError>),
}

/// Aborts the invocation if the outbound stream is dropped mid-call.
struct AbortOnDrop(JoinHandle<ToolResult>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn task_result(tool: &str, joined: Result<ToolResult, JoinError>) -> ToolResult {
    joined.unwrap_or_else(|err| {
        warn!(tool, error = %err, "tool task did not complete");
        ToolResult::Error(format!("tool task failed: {err}"))
    })
}
