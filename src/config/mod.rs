//! Configuration system (layered: defaults < TOML file < env < CLI flags).

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use tracing::debug;

use crate::error::RelayError;

pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_MCP_SERVER_URL: &str = "http://localhost:8001/mcp";
pub const DEFAULT_BIND: &str = "0.0.0.0:8000";
pub const DEFAULT_ELICITATION_TIMEOUT_SECS: u64 = 300;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a meeting scheduling assistant. \
IMPORTANT: When the user wants to schedule a meeting, IMMEDIATELY call the schedule_meeting tool. \
Do NOT ask the user for details - the tool will handle gathering missing information through elicitation. \
Always call the tool first, never ask clarifying questions yourself.";

/// Which executor runs tool calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExecutorKind {
    /// In-process tools.
    #[default]
    Local,
    /// Remote MCP server over streamable HTTP.
    Mcp,
}

/// Relay configuration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub model: String,
    pub executor: ExecutorKind,
    pub mcp_server_url: String,
    pub elicitation_timeout_secs: u64,
    pub bind: String,
    pub system_prompt: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            openai_base_url: None,
            model: DEFAULT_MODEL.to_string(),
            executor: ExecutorKind::default(),
            mcp_server_url: DEFAULT_MCP_SERVER_URL.to_string(),
            elicitation_timeout_secs: DEFAULT_ELICITATION_TIMEOUT_SECS,
            bind: DEFAULT_BIND.to_string(),
            system_prompt: Some(DEFAULT_SYSTEM_PROMPT.to_string()),
        }
    }
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| ".."))
            .field("openai_base_url", &self.openai_base_url)
            .field("model", &self.model)
            .field("executor", &self.executor)
            .field("mcp_server_url", &self.mcp_server_url)
            .field("elicitation_timeout_secs", &self.elicitation_timeout_secs)
            .field("bind", &self.bind)
            .finish_non_exhaustive()
    }
}

impl RelayConfig {
    /// Defaults overlaid with environment variables (`.env` is loaded if present).
    pub fn from_env() -> Result<Self, RelayError> {
        let _ = dotenvy::dotenv();
        Self::default().apply_env()
    }

    /// Full layered load: defaults, then the TOML file, then the environment.
    ///
    /// An explicit `path` must exist. Without one, the per-user default path
    /// is used when a file is there.
    pub fn load(path: Option<&Path>) -> Result<Self, RelayError> {
        let file = match path {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.is_file()),
        };

        let config = match file {
            Some(file) => {
                debug!(path = %file.display(), "loading config file");
                let raw = std::fs::read_to_string(&file).map_err(|e| {
                    RelayError::Configuration(format!("cannot read {}: {e}", file.display()))
                })?;
                Self::from_toml_str(&raw)?
            }
            None => Self::default(),
        };

        let _ = dotenvy::dotenv();
        config.apply_env()
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, RelayError> {
        toml::from_str(raw).map_err(|e| RelayError::Configuration(format!("invalid config file: {e}")))
    }

    pub fn apply_env(self) -> Result<Self, RelayError> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Overlay variables read through `lookup`. Empty values are ignored.
    pub fn apply_env_with(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RelayError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(key) = var("OPENAI_API_KEY") {
            self.openai_api_key = Some(key);
        }
        if let Some(url) = var("OPENAI_BASE_URL") {
            self.openai_base_url = Some(url);
        }
        if let Some(model) = var("OPENAI_MODEL") {
            self.model = model;
        }
        if let Some(url) = var("MCP_SERVER_URL") {
            self.mcp_server_url = url;
        }
        if let Some(kind) = var("RELAY_EXECUTOR") {
            self.executor = ExecutorKind::from_str(kind.trim()).map_err(|_| {
                RelayError::Configuration(format!("RELAY_EXECUTOR must be `local` or `mcp`, got `{kind}`"))
            })?;
        }
        if let Some(secs) = var("ELICITATION_TIMEOUT_SECS") {
            self.elicitation_timeout_secs = secs.trim().parse().map_err(|_| {
                RelayError::Configuration(format!("ELICITATION_TIMEOUT_SECS must be a number, got `{secs}`"))
            })?;
        }
        if let Some(bind) = var("RELAY_BIND") {
            self.bind = bind;
        }
        if let Some(prompt) = var("RELAY_SYSTEM_PROMPT") {
            self.system_prompt = Some(prompt);
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), RelayError> {
        if self.elicitation_timeout_secs == 0 {
            return Err(RelayError::Configuration(
                "elicitation timeout must be at least one second".into(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(RelayError::Configuration("model must not be empty".into()));
        }
        Ok(())
    }

    pub fn elicitation_timeout(&self) -> Duration {
        Duration::from_secs(self.elicitation_timeout_secs)
    }
}

/// Per-user config file location, e.g. `~/.config/elicit-relay/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("dev", "elicit-relay", "elicit-relay")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
