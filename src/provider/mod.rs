//! Model provider trait and implementations.

pub mod http;

#[cfg(feature = "openai")]
pub mod openai;

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::config::RelayConfig;
use crate::error::RelayError;
use crate::tools::ToolSchema;
use crate::types::{GenerationSettings, ModelMessage, StreamChunk};

/// A request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct ProviderRequest {
    pub messages: Vec<ModelMessage>,
    pub settings: GenerationSettings,
    /// `None` (or empty) means the model may not call tools.
    pub tools: Option<Vec<ToolDefinition>>,
}

impl ProviderRequest {
    pub fn new(messages: Vec<ModelMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|tools| !tools.is_empty())
    }
}

/// Tool definition sent to the provider API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl From<&ToolSchema> for ToolDefinition {
    fn from(schema: &ToolSchema) -> Self {
        Self {
            name: schema.name.clone(),
            description: schema.description.clone(),
            parameters: schema.input_schema.clone(),
        }
    }
}

/// Core trait implemented by model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Provider name (e.g., "openai").
    fn provider_name(&self) -> &str;

    /// The model ID this provider instance serves.
    fn model_id(&self) -> &str;

    /// Start a streaming completion.
    ///
    /// Errors before the first chunk are returned directly; failures once the
    /// stream is running arrive as `Err` items.
    async fn stream_completion(
        &self,
        request: &ProviderRequest,
    ) -> Result<BoxStream<'static, Result<StreamChunk, RelayError>>, RelayError>;
}

/// Create the configured provider.
#[allow(unused_variables)]
pub fn create_provider(config: &RelayConfig) -> Result<Arc<dyn ModelProvider>, RelayError> {
    #[cfg(feature = "openai")]
    {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or_else(|| RelayError::Authentication("Missing OPENAI_API_KEY".into()))?;
        Ok(Arc::new(openai::OpenAiProvider::new(
            config.model.clone(),
            api_key,
            config.openai_base_url.clone(),
        )))
    }
    #[cfg(not(feature = "openai"))]
    {
        Err(RelayError::Configuration(
            "no model provider compiled in (enable the `openai` feature)".into(),
        ))
    }
}
