//! Runs one tool call and bridges its elicitations into the registry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::executor::{ElicitationAction, ElicitationHook, ElicitationPrompt, ToolExecutor};
use super::types::ToolResult;
use crate::elicitation::{extract_options, ElicitationOutcome, ElicitationRegistry};
use crate::orchestrator::OutboundEvent;
use crate::types::{ElicitationId, SessionId};

/// Receives events raised while a tool runs.
pub type EventSink = Arc<dyn Fn(OutboundEvent) + Send + Sync>;

pub const DEFAULT_ELICITATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Invokes tools on an executor on behalf of a session.
#[derive(Clone)]
pub struct ToolInvoker {
    executor: Arc<dyn ToolExecutor>,
    registry: ElicitationRegistry,
    elicitation_timeout: Duration,
}

impl ToolInvoker {
    pub fn new(executor: Arc<dyn ToolExecutor>, registry: ElicitationRegistry) -> Self {
        Self {
            executor,
            registry,
            elicitation_timeout: DEFAULT_ELICITATION_TIMEOUT,
        }
    }

    pub fn with_elicitation_timeout(mut self, timeout: Duration) -> Self {
        self.elicitation_timeout = timeout;
        self
    }

    pub fn executor(&self) -> &Arc<dyn ToolExecutor> {
        &self.executor
    }

    pub fn registry(&self) -> &ElicitationRegistry {
        &self.registry
    }

    /// Run `tool_name`. Never fails: executor errors become [`ToolResult::Error`].
    ///
    /// Elicitations raised by the tool are registered, announced through
    /// `on_event`, and awaited for up to the configured timeout.
    pub async fn invoke(
        &self,
        tool_name: &str,
        arguments: Map<String, Value>,
        session: &SessionId,
        on_event: EventSink,
    ) -> ToolResult {
        let hook = Arc::new(SessionElicitation {
            session: session.clone(),
            registry: self.registry.clone(),
            on_event,
            timeout: self.elicitation_timeout,
        });

        info!(session = %session, tool = tool_name, "invoking tool");
        match self.executor.call_tool(tool_name, arguments, hook).await {
            Ok(output) => ToolResult::Success(output.into_payload()),
            Err(err) => {
                warn!(session = %session, tool = tool_name, error = %err, "tool execution failed");
                ToolResult::Error(err.to_string())
            }
        }
    }
}

impl std::fmt::Debug for ToolInvoker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolInvoker")
            .field("executor", &self.executor.name())
            .field("elicitation_timeout", &self.elicitation_timeout)
            .finish()
    }
}

/// Per-call elicitation hook scoped to one session.
struct SessionElicitation {
    session: SessionId,
    registry: ElicitationRegistry,
    on_event: EventSink,
    timeout: Duration,
}

#[async_trait]
impl ElicitationHook for SessionElicitation {
    async fn elicit(&self, prompt: ElicitationPrompt) -> ElicitationAction {
        let options = extract_options(prompt.requested_schema.as_ref());
        let id = ElicitationId::generate(&self.session);

        // Registered before the event goes out so an immediate answer finds it.
        let handle = match self.registry.register(
            id.clone(),
            prompt.message.clone(),
            prompt.requested_schema.clone(),
        ) {
            Ok(handle) => handle,
            Err(err) => {
                warn!(elicitation_id = %id, error = %err, "could not register elicitation");
                return ElicitationAction::Cancel;
            }
        };

        debug!(elicitation_id = %id, options = ?options, "requesting user input");
        (self.on_event)(OutboundEvent::ElicitationRequest {
            elicitation_id: id.clone(),
            message: prompt.message,
            options,
            schema: prompt.requested_schema,
        });

        match handle.wait(self.timeout).await {
            ElicitationOutcome::Answered(response) => {
                debug!(elicitation_id = %id, "elicitation answered");
                ElicitationAction::from_response(response)
            }
            outcome => {
                info!(elicitation_id = %id, ?outcome, "elicitation not answered");
                ElicitationAction::Cancel
            }
        }
    }
}
