//! HTTP mapping for relay errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::error::{ErrorCategory, RelayError};

/// A [`RelayError`] on its way out as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub RelayError);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0.category() {
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCategory::Authentication
            | ErrorCategory::RateLimit
            | ErrorCategory::Network
            | ErrorCategory::Server
            | ErrorCategory::Api => StatusCode::BAD_GATEWAY,
            ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self.0.category() {
            ErrorCategory::NotFound => "NOT_FOUND",
            ErrorCategory::InvalidRequest => "INVALID_REQUEST",
            ErrorCategory::Authentication => "UPSTREAM_AUTH",
            ErrorCategory::RateLimit => "UPSTREAM_RATE_LIMIT",
            ErrorCategory::Network => "UPSTREAM_UNAVAILABLE",
            ErrorCategory::Timeout => "UPSTREAM_TIMEOUT",
            ErrorCategory::Server | ErrorCategory::Api => "UPSTREAM_ERROR",
            ErrorCategory::Configuration => "CONFIGURATION",
            ErrorCategory::ToolExecution => "TOOL_FAILED",
            ErrorCategory::Serialization | ErrorCategory::Unknown => "INTERNAL",
        }
    }
}

impl From<RelayError> for ApiError {
    fn from(err: RelayError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            warn!(error = %self.0, status = status.as_u16(), "request failed");
        }
        let body = json!({
            "error": self.0.to_string(),
            "error_code": self.error_code(),
        });
        (status, Json(body)).into_response()
    }
}
