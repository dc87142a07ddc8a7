//! Process-scoped cache of the executor's tool schemas.

use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use super::executor::ToolExecutor;
use super::types::ToolSchema;

/// Caches the first non-empty tool listing until invalidated.
///
/// A failed or empty listing yields an empty set and is not cached, so the
/// next call retries.
pub struct ToolCatalog {
    executor: Arc<dyn ToolExecutor>,
    cached: RwLock<Option<Arc<Vec<ToolSchema>>>>,
}

impl ToolCatalog {
    pub fn new(executor: Arc<dyn ToolExecutor>) -> Self {
        Self {
            executor,
            cached: RwLock::new(None),
        }
    }

    pub async fn tools(&self) -> Arc<Vec<ToolSchema>> {
        if let Some(tools) = self.cached.read().await.as_ref() {
            return tools.clone();
        }

        let mut cached = self.cached.write().await;
        if let Some(tools) = cached.as_ref() {
            return tools.clone();
        }
        match self.executor.list_tools().await {
            Ok(tools) if tools.is_empty() => {
                warn!(executor = self.executor.name(), "executor listed no tools");
                Arc::new(tools)
            }
            Ok(tools) => {
                info!(executor = self.executor.name(), count = tools.len(), "cached tool schemas");
                let tools = Arc::new(tools);
                *cached = Some(tools.clone());
                tools
            }
            Err(err) => {
                error!(executor = self.executor.name(), error = %err, "failed to list tools");
                Arc::new(Vec::new())
            }
        }
    }

    /// Tool declarations in OpenAI function format.
    pub async fn definitions(&self) -> Vec<Value> {
        self.tools()
            .await
            .iter()
            .map(ToolSchema::to_function_declaration)
            .collect()
    }

    pub async fn invalidate(&self) {
        *self.cached.write().await = None;
    }
}

impl std::fmt::Debug for ToolCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolCatalog")
            .field("executor", &self.executor.name())
            .finish_non_exhaustive()
    }
}
