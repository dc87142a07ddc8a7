//! Model Context Protocol (MCP) executor with elicitation support.

pub mod client;
pub mod handler;

pub use client::McpToolExecutor;
pub use handler::ElicitingClient;
