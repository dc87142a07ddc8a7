//! Client-side handler that answers server elicitation requests.

use std::future::Future;
use std::sync::Arc;

use rmcp::model::{
    ClientCapabilities, ClientInfo, CreateElicitationRequestParams, CreateElicitationResult, ErrorData,
};
use rmcp::service::{RequestContext, RoleClient};
use rmcp::ClientHandler;
use serde_json::{json, Value};
use tracing::debug;

use crate::tools::{ElicitationAction, ElicitationHook, ElicitationPrompt};

/// Forwards every `elicitation/create` request to a per-call hook.
#[derive(Clone)]
pub struct ElicitingClient {
    hook: Arc<dyn ElicitationHook>,
}

impl ElicitingClient {
    pub fn new(hook: Arc<dyn ElicitationHook>) -> Self {
        Self { hook }
    }
}

impl ClientHandler for ElicitingClient {
    fn create_elicitation(
        &self,
        request: CreateElicitationRequestParams,
        _context: RequestContext<RoleClient>,
    ) -> impl Future<Output = Result<CreateElicitationResult, ErrorData>> + Send + '_ {
        async move {
            let raw = serde_json::to_value(&request)
                .map_err(|e| ErrorData::internal_error(format!("unreadable elicitation request: {e}"), None))?;
            let prompt = prompt_from_request(&raw);
            debug!(message = %prompt.message, "server requested elicitation");

            let action = self.hook.elicit(prompt).await;
            elicitation_result(&action)
        }
    }

    fn get_info(&self) -> ClientInfo {
        let mut info = ClientInfo::default();
        info.capabilities = elicitation_capabilities();
        info
    }
}

/// Read the prompt from the request's wire form.
pub(crate) fn prompt_from_request(raw: &Value) -> ElicitationPrompt {
    let message = raw
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let schema = raw.get("requestedSchema").filter(|s| !s.is_null()).cloned();
    ElicitationPrompt {
        message,
        requested_schema: schema,
    }
}

/// MCP requires accepted content to be an object; bare answers go under `value`.
pub(crate) fn elicitation_result(action: &ElicitationAction) -> Result<CreateElicitationResult, ErrorData> {
    let mut wire = action.to_value();
    if let Some(content) = wire.get_mut("content").filter(|c| !c.is_object()) {
        *content = json!({ "value": content.take() });
    }
    serde_json::from_value(wire)
        .map_err(|e| ErrorData::internal_error(format!("unencodable elicitation answer: {e}"), None))
}

fn elicitation_capabilities() -> ClientCapabilities {
    serde_json::from_value(json!({ "elicitation": {} })).unwrap_or_default()
}
