//! Turns a model stream plus tool invocations into one ordered event sequence.

pub mod accumulator;
pub mod events;
pub mod runner;

pub use accumulator::{PendingToolCall, ToolCallAccumulator};
pub use events::{OutboundEvent, DONE_FRAME};
pub use runner::{OutboundStream, StreamOrchestrator};
