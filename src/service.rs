//! The relay service: process-scoped state plus the outward operations.

use std::sync::Arc;

use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::{ExecutorKind, RelayConfig};
use crate::elicitation::{ElicitationRegistry, ElicitationRequest};
use crate::error::RelayError;
use crate::orchestrator::{OutboundEvent, OutboundStream, StreamOrchestrator};
use crate::provider::{self, ModelProvider};
use crate::tools::{LocalToolExecutor, ToolCatalog, ToolExecutor, ToolInvoker, ToolSchema};
use crate::types::{ChatMessage, ModelMessage};

/// Body of a chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
}

impl ChatRequest {
    pub fn into_messages(self) -> Vec<ModelMessage> {
        self.messages.into_iter().map(ModelMessage::from).collect()
    }
}

/// Body of an elicitation answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationReply {
    pub elicitation_id: String,
    pub response: Value,
}

/// Body of an elicitation cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElicitationCancel {
    pub elicitation_id: String,
}

struct RelayInner {
    registry: ElicitationRegistry,
    catalog: Arc<ToolCatalog>,
    orchestrator: StreamOrchestrator,
    executor: Arc<dyn ToolExecutor>,
    shutdown: CancellationToken,
}

/// Owns everything a running relay shares across sessions.
///
/// Cheap to clone.
#[derive(Clone)]
pub struct Relay {
    inner: Arc<RelayInner>,
}

impl Relay {
    pub fn new(provider: Arc<dyn ModelProvider>, executor: Arc<dyn ToolExecutor>, config: &RelayConfig) -> Self {
        let registry = ElicitationRegistry::new();
        let catalog = Arc::new(ToolCatalog::new(executor.clone()));
        let invoker = ToolInvoker::new(executor.clone(), registry.clone())
            .with_elicitation_timeout(config.elicitation_timeout());
        let orchestrator = StreamOrchestrator::new(provider, invoker, catalog.clone())
            .with_system_prompt(config.system_prompt.clone());

        Self {
            inner: Arc::new(RelayInner {
                registry,
                catalog,
                orchestrator,
                executor,
                shutdown: CancellationToken::new(),
            }),
        }
    }

    /// Build the provider and executor named by `config`.
    pub fn from_config(config: &RelayConfig) -> Result<Self, RelayError> {
        let provider = provider::create_provider(config)?;
        let executor = create_executor(config)?;
        Ok(Self::new(provider, executor, config))
    }

    /// Run one chat turn and stream its events.
    pub fn stream_chat(&self, messages: Vec<ModelMessage>) -> OutboundStream {
        let shutdown = self.inner.shutdown.clone();
        self.inner
            .orchestrator
            .stream(messages)
            .take_until(async move { shutdown.cancelled().await })
            .boxed()
    }

    /// [`stream_chat`](Self::stream_chat) encoded as wire frames, ending in `[DONE]`.
    pub fn stream_frames(&self, messages: Vec<ModelMessage>) -> BoxStream<'static, Result<String, RelayError>> {
        self.stream_chat(messages)
            .map(|event| event.and_then(|event| event.to_frame().map_err(RelayError::from)))
            .boxed()
    }

    /// Deliver a user's answer to a pending elicitation.
    pub fn respond(&self, elicitation_id: &str, response: Value) -> Result<(), RelayError> {
        if self.inner.registry.resolve(elicitation_id, response) {
            info!(elicitation_id, "elicitation answered");
            Ok(())
        } else {
            warn!(elicitation_id, "answer for unknown elicitation");
            Err(RelayError::ElicitationNotFound(elicitation_id.to_string()))
        }
    }

    /// Cancel a pending elicitation; the tool sees a cancel action.
    pub fn cancel_elicitation(&self, elicitation_id: &str) -> Result<(), RelayError> {
        if self.inner.registry.cancel(elicitation_id) {
            info!(elicitation_id, "elicitation cancelled");
            Ok(())
        } else {
            Err(RelayError::ElicitationNotFound(elicitation_id.to_string()))
        }
    }

    pub fn pending_elicitations(&self) -> Vec<ElicitationRequest> {
        self.inner.registry.pending()
    }

    pub async fn list_tools(&self) -> Arc<Vec<ToolSchema>> {
        self.inner.catalog.tools().await
    }

    pub async fn tool_definitions(&self) -> Vec<Value> {
        self.inner.catalog.definitions().await
    }

    pub async fn is_healthy(&self) -> bool {
        self.inner.executor.health_check().await
    }

    pub fn executor_name(&self) -> &str {
        self.inner.executor.name()
    }

    pub fn registry(&self) -> &ElicitationRegistry {
        &self.inner.registry
    }

    /// Stop streaming sessions and cancel every pending elicitation.
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        let cancelled = self.inner.registry.cancel_all();
        info!(cancelled, "relay shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.inner.shutdown.is_cancelled()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.inner.shutdown.clone()
    }
}

impl std::fmt::Debug for Relay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Relay")
            .field("executor", &self.executor_name())
            .field("orchestrator", &self.inner.orchestrator)
            .field("pending", &self.inner.registry.len())
            .finish()
    }
}

/// Create the executor named by `config.executor`.
pub fn create_executor(config: &RelayConfig) -> Result<Arc<dyn ToolExecutor>, RelayError> {
    match config.executor {
        ExecutorKind::Local => Ok(Arc::new(LocalToolExecutor::with_meeting_tools())),
        #[cfg(feature = "mcp")]
        ExecutorKind::Mcp => Ok(Arc::new(crate::mcp::McpToolExecutor::new(config.mcp_server_url.clone()))),
        #[cfg(not(feature = "mcp"))]
        ExecutorKind::Mcp => Err(RelayError::Configuration(
            "the `mcp` executor requires the `mcp` feature".into(),
        )),
    }
}

/// Collects a whole session; handy for tests and the CLI.
pub async fn collect_events(mut stream: OutboundStream) -> (Vec<OutboundEvent>, Option<RelayError>) {
    let mut events = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(event) => events.push(event),
            Err(err) => return (events, Some(err)),
        }
    }
    (events, None)
}
