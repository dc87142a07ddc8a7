//! In-process executor hosting [`Tool`] implementations.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::executor::{ElicitationHook, ExecutorOutput, ToolExecutor};
use super::tool::{Tool, ToolContext};
use super::types::ToolSchema;
use crate::error::RelayError;

/// Runs registered tools in the current process.
#[derive(Default, Clone)]
pub struct LocalToolExecutor {
    tools: HashMap<String, Arc<dyn Tool>>,
    order: Vec<String>,
}

impl LocalToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Executor preloaded with the meeting tools.
    pub fn with_meeting_tools() -> Self {
        super::meeting::register(Self::new())
    }

    /// Add a tool. A tool with the same name replaces the earlier one.
    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.register(Arc::new(tool));
        self
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        if self.tools.insert(name.clone(), tool).is_none() {
            self.order.push(name);
        }
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for LocalToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalToolExecutor")
            .field("tools", &self.order)
            .finish()
    }
}

#[async_trait]
impl ToolExecutor for LocalToolExecutor {
    fn name(&self) -> &str {
        "local"
    }

    async fn list_tools(&self) -> Result<Vec<ToolSchema>, RelayError> {
        Ok(self
            .order
            .iter()
            .filter_map(|name| self.tools.get(name))
            .map(|tool| tool.schema())
            .collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
        hook: Arc<dyn ElicitationHook>,
    ) -> Result<ExecutorOutput, RelayError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| RelayError::tool(name, "unknown tool"))?;
        debug!(tool = name, "running local tool");
        let value = tool.execute(arguments, &ToolContext::new(hook)).await?;
        Ok(ExecutorOutput::structured(value))
    }
}
