//! Convenience re-exports for common use.

pub use crate::config::{ExecutorKind, RelayConfig};
pub use crate::elicitation::{ElicitationRegistry, ElicitationRequest};
pub use crate::error::{RelayError, Result};
pub use crate::orchestrator::{OutboundEvent, OutboundStream, StreamOrchestrator};
pub use crate::provider::{ModelProvider, ProviderRequest};
pub use crate::service::{collect_events, Relay};
pub use crate::tools::{
    ElicitationAction, ElicitationHook, ElicitationPrompt, ExecutorOutput, Tool, ToolContext,
    ToolExecutor, ToolResult, ToolSchema,
};
pub use crate::types::{ChatMessage, FinishReason, GenerationSettings, ModelMessage, Role, StreamChunk};
