//! CLI entry point for the relay.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{ExecutorKind, RelayConfig};
use crate::error::RelayError;

/// Streaming chat relay with mid-call user elicitation.
#[derive(Parser, Debug)]
#[command(name = "elicit-relay", version, about = "Streaming chat relay with mid-call user elicitation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP relay
    Serve(ServeArgs),
    /// Print the tools the configured executor offers
    Tools(CommonArgs),
}

/// Flags shared by every command. Each one overrides the config file and environment.
#[derive(Args, Debug, Default)]
pub struct CommonArgs {
    /// Config file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tool executor (local, mcp)
    #[arg(short, long)]
    pub executor: Option<ExecutorKind>,

    /// MCP server URL
    #[arg(long)]
    pub mcp_url: Option<String>,

    /// Chat model
    #[arg(short, long)]
    pub model: Option<String>,
}

/// Arguments for `elicit-relay serve`.
#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(short, long)]
    pub bind: Option<String>,

    /// Seconds a tool waits for a user's answer
    #[arg(long)]
    pub elicitation_timeout: Option<u64>,
}

impl CommonArgs {
    /// Load the layered config and apply these flags on top.
    pub fn load_config(&self) -> Result<RelayConfig, RelayError> {
        let config = RelayConfig::load(self.config.as_deref())?;
        self.apply(config)
    }

    pub fn apply(&self, mut config: RelayConfig) -> Result<RelayConfig, RelayError> {
        if let Some(executor) = self.executor {
            config.executor = executor;
        }
        if let Some(url) = &self.mcp_url {
            config.mcp_server_url = url.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        config.validate()?;
        Ok(config)
    }
}

impl ServeArgs {
    pub fn load_config(&self) -> Result<RelayConfig, RelayError> {
        let config = RelayConfig::load(self.common.config.as_deref())?;
        self.apply(config)
    }

    pub fn apply(&self, config: RelayConfig) -> Result<RelayConfig, RelayError> {
        let mut config = self.common.apply(config)?;
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(secs) = self.elicitation_timeout {
            config.elicitation_timeout_secs = secs;
        }
        config.validate()?;
        Ok(config)
    }
}
