//! Session and elicitation identifiers.

use std::borrow::Borrow;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifies one chat session (the processing of one user message).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id (`chat_<uuid>`).
    pub fn new() -> Self {
        Self(format!("chat_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifies one pending elicitation.
///
/// Generated ids embed a full v4 uuid, so they never collide across
/// concurrently active sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ElicitationId(String);

impl ElicitationId {
    /// Generate a fresh id scoped to `session`.
    pub fn generate(session: &SessionId) -> Self {
        Self(format!("{}_{}", session.as_str(), Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ElicitationId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ElicitationId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for ElicitationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ElicitationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
