//! Error classification shared by the service and HTTP layers.

/// Broad error category for routing recovery and status-code logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Authentication,
    RateLimit,
    Network,
    Timeout,
    Server,
    Api,
    Configuration,
    Serialization,
    ToolExecution,
    NotFound,
    InvalidRequest,
    Unknown,
}

impl ErrorCategory {
    /// Whether the caller (rather than an upstream dependency) is at fault.
    pub fn is_client_error(self) -> bool {
        matches!(self, Self::NotFound | Self::InvalidRequest)
    }
}
