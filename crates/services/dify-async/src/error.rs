use std::fmt;

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when using the Dify chat client
#[derive(Debug, Error)]
pub enum DifyError {
    /// Transport failure: connect, reset, or an unreadable response body
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),

    /// Non-success HTTP status; displays the response body verbatim
    #[error("{0}")]
    Api(ApiErrorObject),

    /// An `error` event arrived inside the stream
    #[error("{0}")]
    Upstream(StreamErrorEvent),

    /// The stream sent more than `limit` bytes without a line break
    #[error("stream line exceeds {limit} bytes without a newline")]
    LineTooLong {
        /// Configured maximum line length in bytes
        limit: usize,
    },

    /// The turn was abandoned before it completed
    #[error("chat turn cancelled: {0}")]
    Cancelled(CancelReason),

    /// Configuration error (e.g., missing credentials)
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The request violates an invariant and was never sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(String),
}

/// Why a turn was cancelled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// The caller fired the cancellation token
    Aborted,
    /// The per-turn deadline elapsed
    TimedOut,
}

impl fmt::Display for CancelReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aborted => f.write_str("aborted by caller"),
            Self::TimedOut => f.write_str("deadline elapsed"),
        }
    }
}

/// Error returned by Dify with a non-success HTTP status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorObject {
    /// HTTP status code
    #[serde(default)]
    pub status_code: Option<u16>,
    /// Machine-readable error code (e.g. `invalid_param`)
    #[serde(default)]
    pub code: Option<String>,
    /// Human-readable error message
    #[serde(default)]
    pub message: String,
    /// Raw response body
    #[serde(skip)]
    pub body: String,
}

impl fmt::Display for ApiErrorObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.body.is_empty() {
            return f.write_str(&self.body);
        }
        match self.status_code {
            Some(status) => write!(f, "Dify API error (HTTP {status})"),
            None => f.write_str("Dify API error"),
        }
    }
}

/// Payload of an `error` event received mid-stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamErrorEvent {
    /// Human-readable message
    pub message: String,
    /// Machine-readable error code, when the provider sends one
    pub code: Option<String>,
    /// HTTP-like status the provider attached to the event
    pub status: Option<u16>,
}

impl fmt::Display for StreamErrorEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl DifyError {
    /// Determines if opening the turn again could succeed
    ///
    /// Retryable errors include rate limits (429), timeouts (408),
    /// server errors (5xx), and connect/timeout transport failures.
    /// Mid-stream failures are never retryable: the caller has already
    /// observed part of the turn.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api(obj) => obj
                .status_code
                .is_some_and(crate::retry::is_retryable_status),
            Self::Reqwest(e) => e.is_timeout() || e.is_connect(),
            Self::Upstream(_)
            | Self::LineTooLong { .. }
            | Self::Cancelled(_)
            | Self::Config(_)
            | Self::InvalidRequest(_)
            | Self::Serde(_) => false,
        }
    }

    /// True if the turn ended because of caller abort or a deadline
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Builds an API error from a non-success response
///
/// The body text is kept verbatim for display. If it is Dify's JSON error
/// shape, `code` and `message` are filled in as well.
#[must_use]
pub fn deserialize_api_error(status: StatusCode, body: &[u8]) -> DifyError {
    let text = String::from_utf8_lossy(body).into_owned();
    let mut obj = serde_json::from_slice::<ApiErrorObject>(body).unwrap_or(ApiErrorObject {
        status_code: None,
        code: None,
        message: String::new(),
        body: String::new(),
    });
    obj.status_code = Some(status.as_u16());
    if obj.message.is_empty() {
        obj.message.clone_from(&text);
    }
    obj.body = text;
    DifyError::Api(obj)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_error_displays_body_verbatim() {
        let body = br#"{"code":"invalid_param","message":"query is required","status":400}"#;
        let err = deserialize_api_error(StatusCode::BAD_REQUEST, body);
        assert_eq!(err.to_string(), String::from_utf8_lossy(body));
        match err {
            DifyError::Api(obj) => {
                assert_eq!(obj.status_code, Some(400));
                assert_eq!(obj.code.as_deref(), Some("invalid_param"));
                assert_eq!(obj.message, "query is required");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[test]
    fn plain_text_body_becomes_message() {
        let err = deserialize_api_error(StatusCode::BAD_GATEWAY, b"upstream unavailable");
        assert_eq!(err.to_string(), "upstream unavailable");
        assert!(err.is_retryable());
    }

    #[test]
    fn empty_body_falls_back_to_status() {
        let err = deserialize_api_error(StatusCode::UNAUTHORIZED, b"");
        assert_eq!(err.to_string(), "Dify API error (HTTP 401)");
        assert!(!err.is_retryable());
    }

    #[test]
    fn stream_failures_are_not_retryable() {
        let err = DifyError::Upstream(StreamErrorEvent {
            message: "quota exceeded".into(),
            code: None,
            status: Some(429),
        });
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "quota exceeded");
        assert!(DifyError::Cancelled(CancelReason::TimedOut).is_cancelled());
    }
}
