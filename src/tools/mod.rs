//! Tool execution: executor seams, invocation, schema cache, local tools.

pub mod catalog;
pub mod executor;
pub mod invoker;
pub mod local;
pub mod meeting;
pub mod tool;
pub mod types;

pub use catalog::ToolCatalog;
pub use executor::{
    ElicitationAction, ElicitationHook, ElicitationPrompt, ExecutorOutput, NoElicitation, ToolExecutor,
};
pub use invoker::{EventSink, ToolInvoker, DEFAULT_ELICITATION_TIMEOUT};
pub use local::LocalToolExecutor;
pub use meeting::{MeetingResult, ScheduleMeetingTool};
pub use tool::{FnTool, Tool, ToolContext};
pub use types::{ToolParameters, ToolResult, ToolSchema};
