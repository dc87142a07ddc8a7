//! In-process tool trait and closure-based tool wrapper.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::executor::{ElicitationAction, ElicitationHook, ElicitationPrompt, NoElicitation};
use super::types::{ToolParameters, ToolSchema};
use crate::error::RelayError;

/// Context available during tool execution.
#[derive(Clone)]
pub struct ToolContext {
    hook: Arc<dyn ElicitationHook>,
}

impl ToolContext {
    pub fn new(hook: Arc<dyn ElicitationHook>) -> Self {
        Self { hook }
    }

    /// Ask the user a question and wait for the answer.
    pub async fn elicit(&self, message: impl Into<String>, schema: Option<Value>) -> ElicitationAction {
        let mut prompt = ElicitationPrompt::new(message);
        prompt.requested_schema = schema;
        self.hook.elicit(prompt).await
    }
}

impl Default for ToolContext {
    fn default() -> Self {
        Self::new(Arc::new(NoElicitation))
    }
}

impl std::fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolContext").finish_non_exhaustive()
    }
}

/// Core tool trait; implement to host a tool in-process.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name (must match what the model calls).
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    fn parameters(&self) -> &ToolParameters;

    async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext) -> Result<Value, RelayError>;

    fn schema(&self) -> ToolSchema {
        ToolSchema::new(self.name(), self.description(), self.parameters().clone())
    }
}

type ToolHandler = dyn Fn(Map<String, Value>, ToolContext) -> Pin<Box<dyn Future<Output = Result<Value, RelayError>> + Send>>
    + Send
    + Sync;

/// Closure-based tool for quick tool creation.
pub struct FnTool {
    name: String,
    description: String,
    parameters: ToolParameters,
    handler: Arc<ToolHandler>,
}

impl FnTool {
    pub fn new<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: ToolParameters,
        handler: F,
    ) -> Self
    where
        F: Fn(Map<String, Value>, ToolContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, RelayError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
            handler: Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        }
    }
}

#[async_trait]
impl Tool for FnTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters(&self) -> &ToolParameters {
        &self.parameters
    }

    async fn execute(&self, args: Map<String, Value>, ctx: &ToolContext) -> Result<Value, RelayError> {
        (self.handler)(args, ctx.clone()).await
    }
}

impl std::fmt::Debug for FnTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish()
    }
}
