//! Shared HTTP client, SSE parsing, and auth utilities.

use std::sync::OnceLock;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};

use crate::error::RelayError;

static SHARED_CLIENT: OnceLock<reqwest::Client> = OnceLock::new();

/// Get (or create) the shared reqwest client.
///
/// No overall request timeout: completions stream for as long as the model
/// keeps producing.
pub fn shared_client() -> &'static reqwest::Client {
    SHARED_CLIENT.get_or_init(|| {
        reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(30))
            .pool_max_idle_per_host(10)
            .build()
            .expect("Failed to build HTTP client")
    })
}

/// Default headers for a Bearer-token API that answers with SSE.
pub fn bearer_headers(api_key: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
    if let Ok(val) = HeaderValue::from_str(&format!("Bearer {api_key}")) {
        headers.insert(AUTHORIZATION, val);
    }
    headers
}

/// One parsed SSE line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    /// Comments, blank lines and fields other than `data`.
    Ignored,
}

/// Parse one trimmed SSE line.
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let Some(data) = line.strip_prefix("data:") else {
        return SseLine::Ignored;
    };
    match data.trim_start() {
        "" => SseLine::Ignored,
        "[DONE]" => SseLine::Done,
        data => SseLine::Data(data),
    }
}

/// Accumulates raw bytes and hands out complete lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));
    }

    /// Next complete line, trimmed. `None` until a newline arrives.
    pub fn next_line(&mut self) -> Option<String> {
        let line_end = self.buffer.find('\n')?;
        let line = self.buffer[..line_end].trim().to_string();
        self.buffer.drain(..=line_end);
        Some(line)
    }

    /// Whatever is left once the byte stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }
}

/// Map a non-success HTTP status to an error.
pub fn status_to_error(status: u16, body: &str) -> RelayError {
    match status {
        401 | 403 => RelayError::Authentication(error_message(body)),
        429 => RelayError::RateLimited {
            retry_after_ms: extract_retry_after(body),
        },
        _ => RelayError::api(status, error_message(body)),
    }
}

/// Prefer `error.message` from a JSON error body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}

fn extract_retry_after(body: &str) -> Option<u64> {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .and_then(|e| e.get("retry_after"))
                .and_then(|r| r.as_f64())
                .map(|s| (s * 1000.0) as u64)
        })
}
