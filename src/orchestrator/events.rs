//! Outbound events and their wire framing.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::ElicitationId;

/// Literal frame that terminates a session's event sequence.
pub const DONE_FRAME: &str = "[DONE]";

/// One item of the outbound event sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    CompletionDelta {
        content: String,
    },
    ToolStarted {
        name: String,
        args: Value,
    },
    ElicitationRequest {
        elicitation_id: ElicitationId,
        message: String,
        options: Option<Vec<Value>>,
        schema: Option<Value>,
    },
    ToolResult {
        name: String,
        result: Value,
    },
    StreamEnd,
}

impl OutboundEvent {
    pub fn delta(content: impl Into<String>) -> Self {
        Self::CompletionDelta {
            content: content.into(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::StreamEnd)
    }

    /// Encode as one wire frame: a JSON object, or `[DONE]` for the end marker.
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        match self {
            Self::StreamEnd => Ok(DONE_FRAME.to_string()),
            event => serde_json::to_string(event),
        }
    }

    /// Inverse of [`to_frame`](Self::to_frame).
    pub fn from_frame(frame: &str) -> Result<Self, serde_json::Error> {
        if frame.trim() == DONE_FRAME {
            return Ok(Self::StreamEnd);
        }
        serde_json::from_str(frame)
    }
}
