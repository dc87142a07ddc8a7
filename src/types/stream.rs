//! Streaming types produced by model providers.

use serde::{Deserialize, Serialize};

use super::generation::FinishReason;
use super::message::Role;

/// One incremental chunk of a streaming completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamChunk {
    /// Role announced by the provider (usually only on the first chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    /// Incremental text content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tool-call fragments, keyed by their position index.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallFragment>,
    /// Finish reason (only on the final chunk).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

impl StreamChunk {
    /// A chunk carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    /// A chunk carrying a single tool-call fragment.
    pub fn tool_call(fragment: ToolCallFragment) -> Self {
        Self {
            tool_calls: vec![fragment],
            ..Default::default()
        }
    }

    /// A terminal chunk with the given finish reason.
    pub fn finished(reason: FinishReason) -> Self {
        Self {
            finish_reason: Some(reason),
            ..Default::default()
        }
    }
}

/// A partial tool call as streamed by the provider.
///
/// Fragments sharing an `index` belong to the same call; `arguments` pieces
/// are concatenated in arrival order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolCallFragment {
    pub index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

impl ToolCallFragment {
    /// Opening fragment: carries the id and function name.
    pub fn start(index: u32, id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            index,
            id: Some(id.into()),
            name: Some(name.into()),
            arguments: None,
        }
    }

    /// Continuation fragment: carries a slice of argument text.
    pub fn arguments(index: u32, arguments: impl Into<String>) -> Self {
        Self {
            index,
            arguments: Some(arguments.into()),
            ..Default::default()
        }
    }
}
