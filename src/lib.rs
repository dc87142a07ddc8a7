//! elicit-relay: streams model completions to a client while tool calls run,
//! letting a tool pause mid-call to ask the user a question.
//!
//! # Quick Start
//!
//! ```no_run
//! use elicit_relay::prelude::*;
//!
//! # async fn example() -> elicit_relay::error::Result<()> {
//! let config = RelayConfig::from_env()?;
//! let relay = Relay::from_config(&config)?;
//! let (events, error) = collect_events(relay.stream_chat(vec![ModelMessage::user("Schedule a meeting")])).await;
//! println!("{} events, error: {error:?}", events.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod elicitation;
pub mod error;
pub mod orchestrator;
pub mod prelude;
pub mod provider;
pub mod service;
pub mod tools;
pub mod types;

#[cfg(feature = "mcp")]
pub mod mcp;

#[cfg(feature = "server")]
pub mod server;

#[cfg(feature = "cli")]
pub mod cli;
