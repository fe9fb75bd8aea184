//! Typed errors for backend calls
//!
//! HTTP failures carry the message the user should see, extracted from the
//! JSON error body when the server sends one.

use thiserror::Error;

/// Maximum number of body characters quoted in a fallback message
const BODY_SNIPPET_CHARS: usize = 100;

/// Backend operation errors
#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response; `message` is already user-facing
    ///
    /// `server_message` is the body's own `message` field, which the auth
    /// screens show verbatim.
    #[error("{message}")]
    Status {
        status: u16,
        message: String,
        server_message: Option<String>,
    },

    /// Rate limit exceeded (HTTP 429)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Connection refused, timeout, DNS failure
    #[error("Network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape
    #[error("Invalid response: {0}")]
    Decode(String),

    /// Local I/O while preparing a request (e.g. reading an upload)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// Build an error from a failed response's status and raw body
    ///
    /// The message is the body's `detail`, `error` or `message` field when the
    /// body is JSON, else `Error: <status>` followed by a short body excerpt.
    pub fn from_http_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = error_message_from_body(status.as_u16(), body);
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return ApiError::RateLimited(message);
        }
        ApiError::Status {
            status: status.as_u16(),
            message,
            server_message: message_field(body),
        }
    }

    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            ApiError::Network(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            ApiError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, "")
        } else {
            ApiError::Network(e.to_string())
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            ApiError::RateLimited(_) => Some(429),
            _ => None,
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited(_))
    }
}

/// Extract a user-facing message from an error response body
pub fn error_message_from_body(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for key in ["detail", "error", "message"] {
            match value.get(key) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => return s.clone(),
                Some(serde_json::Value::Null) | None => {}
                Some(other) => return other.to_string(),
            }
        }
        return format!("Error: {}", status);
    }

    let snippet: String = body.trim().chars().take(BODY_SNIPPET_CHARS).collect();
    if snippet.is_empty() {
        format!("Error: {}", status)
    } else {
        format!("Error: {} - {}", status, snippet)
    }
}

/// The `message` string of a JSON error body
fn message_field(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        serde_json::Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_detail_field_wins() {
        let err = ApiError::from_http_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail":"Query too long","error":"ignored"}"#,
        );
        assert_eq!(err.to_string(), "Query too long");
        assert_eq!(err.status(), Some(400));
    }

    #[test]
    fn test_error_then_message_fields() {
        assert_eq!(
            error_message_from_body(500, r#"{"error":"db down"}"#),
            "db down"
        );
        assert_eq!(
            error_message_from_body(401, r#"{"message":"Invalid credentials"}"#),
            "Invalid credentials"
        );
    }

    #[test]
    fn test_server_message_only_from_message_field() {
        let err = ApiError::from_http_status(
            StatusCode::UNAUTHORIZED,
            r#"{"message":"Invalid credentials"}"#,
        );
        assert!(matches!(
            err,
            ApiError::Status { server_message: Some(ref m), .. } if m == "Invalid credentials"
        ));

        let err = ApiError::from_http_status(StatusCode::BAD_REQUEST, r#"{"detail":"Bad"}"#);
        assert_eq!(err.to_string(), "Bad");
        assert!(matches!(err, ApiError::Status { server_message: None, .. }));
    }

    #[test]
    fn test_json_without_known_fields_is_generic() {
        assert_eq!(error_message_from_body(503, r#"{"foo":1}"#), "Error: 503");
    }

    #[test]
    fn test_plain_body_is_truncated() {
        let body = "x".repeat(300);
        let msg = error_message_from_body(502, &body);
        assert_eq!(msg, format!("Error: 502 - {}", "x".repeat(100)));
        assert_eq!(error_message_from_body(404, ""), "Error: 404");
    }

    #[test]
    fn test_rate_limit_is_typed() {
        let err = ApiError::from_http_status(StatusCode::TOO_MANY_REQUESTS, "slow down");
        assert!(err.is_rate_limited());
        assert_eq!(err.status(), Some(429));
    }
}
