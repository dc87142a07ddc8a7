//! Tool executor backed by a remote MCP server over streamable HTTP.

use std::sync::Arc;

use async_trait::async_trait;
use rmcp::model::{CallToolRequestParams, CallToolResult, Content, ResourceContents};
use rmcp::service::{ClientInitializeError, RoleClient, RunningService, ServiceError};
use rmcp::transport::StreamableHttpClientTransport;
use rmcp::ServiceExt;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::handler::ElicitingClient;
use crate::error::RelayError;
use crate::tools::{ElicitationHook, ExecutorOutput, NoElicitation, ToolExecutor, ToolSchema};

type McpSession = RunningService<RoleClient, ElicitingClient>;

/// Opens a fresh MCP session for every operation, so a wedged elicitation
/// never blocks another call.
#[derive(Debug, Clone)]
pub struct McpToolExecutor {
    url: String,
}

impl McpToolExecutor {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn connect(&self, hook: Arc<dyn ElicitationHook>) -> Result<McpSession, RelayError> {
        debug!(url = %self.url, "opening MCP session");
        let transport = StreamableHttpClientTransport::from_uri(self.url.as_str());
        ElicitingClient::new(hook)
            .serve(transport)
            .await
            .map_err(map_client_initialize_error)
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    fn name(&self) -> &str {
        "mcp"
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, RelayError> {
        let session = self.connect(Arc::new(NoElicitation)).await?;
        let tools = session
            .list_all_tools()
            .await
            .map_err(|e| map_service_error("list_tools", e));
        close(session).await;
        Ok(tools?.into_iter().map(map_mcp_tool_schema).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        hook: Arc<dyn ElicitationHook>,
    ) -> Result<ExecutorOutput, RelayError> {
        let session = self.connect(hook).await?;
        let result = session
            .call_tool(CallToolRequestParams {
                meta: None,
                name: name.to_owned().into(),
                arguments: (!arguments.is_empty()).then_some(arguments),
                task: None,
            })
            .await
            .map_err(|e| map_service_error("call_tool", e));
        close(session).await;
        map_call_result(name, result?)
    }
}

async fn close(session: McpSession) {
    if let Err(err) = session.cancel().await {
        warn!(error = %err, "MCP session did not shut down cleanly");
    }
}

fn map_mcp_tool_schema(tool: rmcp::model::Tool) -> ToolSchema {
    ToolSchema {
        name: tool.name.to_string(),
        description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
        input_schema: Value::Object((*tool.input_schema).clone()),
    }
}

fn text_items(content: &[Content]) -> Vec<String> {
    content
        .iter()
        .filter_map(|item| {
            if let Some(text) = item.as_text() {
                return Some(text.text.clone());
            }
            match &item.as_resource()?.resource {
                ResourceContents::TextResourceContents { text, .. } => Some(text.clone()),
                _ => None,
            }
        })
        .collect()
}

fn map_call_result(name: &str, result: CallToolResult) -> Result<ExecutorOutput, RelayError> {
    let text_content = text_items(&result.content);

    if result.is_error.unwrap_or(false) {
        let message = result
            .structured_content
            .as_ref()
            .map(|v| v.to_string())
            .or_else(|| (!text_content.is_empty()).then(|| text_content.join("\n")))
            .unwrap_or_else(|| "MCP tool returned an error result".into());
        return Err(RelayError::tool(name, message));
    }

    Ok(ExecutorOutput {
        structured_content: result.structured_content,
        text_content,
    })
}

fn map_client_initialize_error(error: ClientInitializeError) -> RelayError {
    match error {
        ClientInitializeError::ConnectionClosed(context) => {
            RelayError::Stream(format!("MCP initialize connection closed: {context}"))
        }
        ClientInitializeError::TransportError { error, context } => {
            RelayError::Stream(format!("MCP initialize transport error ({context}): {error}"))
        }
        ClientInitializeError::JsonRpcError(error) => RelayError::Provider {
            provider: "mcp".into(),
            message: format!("MCP initialize JSON-RPC error {}: {}", error.code.0, error.message),
        },
        ClientInitializeError::Cancelled => RelayError::Stream("MCP initialize cancelled".into()),
        other => RelayError::Provider {
            provider: "mcp".into(),
            message: format!("MCP initialize error: {other}"),
        },
    }
}

fn map_service_error(context: &str, error: ServiceError) -> RelayError {
    match error {
        ServiceError::McpError(error) => RelayError::Provider {
            provider: "mcp".into(),
            message: format!("{context}: MCP error {}: {}", error.code.0, error.message),
        },
        ServiceError::TransportSend(error) => {
            RelayError::Stream(format!("{context}: MCP transport send failed: {error}"))
        }
        ServiceError::TransportClosed => RelayError::Stream(format!("{context}: MCP transport closed")),
        ServiceError::Cancelled { reason } => {
            let suffix = reason.as_deref().map(|r| format!(" ({r})")).unwrap_or_default();
            RelayError::Stream(format!("{context}: MCP request cancelled{suffix}"))
        }
        ServiceError::Timeout { timeout } => RelayError::Timeout(timeout.as_millis() as u64),
        other => RelayError::Provider {
            provider: "mcp".into(),
            message: format!("{context}: MCP service error: {other}"),
        },
    }
}
