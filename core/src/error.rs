//! Error types for the request pipeline.
//!
//! # Design
//! Every recoverable failure of a send reaches the caller as an `ApiError`
//! through the single result channel. Adapter failures abort before any
//! network call is made; transport failures and malformed responses are
//! detected by the client; `Response` is reserved for failures surfaced by a
//! decision (bad status, decode error) and keeps the HTTP status alongside the
//! underlying error so callers can inspect both.

use thiserror::Error;

/// Boxed error used where a decision or log sink can fail with anything.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for pipeline operations.
pub type Result<T, E = ApiError> = std::result::Result<T, E>;

/// Failure raised by a parameter adapter or a request adapter.
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The parameter source did not serialize to a string-keyed map.
    #[error("parameters must serialize to a JSON object, got {found}")]
    InvalidParameters { found: &'static str },

    /// Encoding the parameters into a request body failed.
    #[error("failed to encode parameters: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A header name or value was rejected.
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },

    /// Adapter-specific failure.
    #[error("{0}")]
    Custom(String),
}

/// Failure reported by a [`Transport`](crate::transport::Transport)
/// implementation.
#[derive(Debug, Clone, Error)]
#[error("transport error: {message}")]
pub struct TransportError {
    pub message: String,
    pub timed_out: bool,
}

impl TransportError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: false,
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            timed_out: true,
        }
    }
}

/// The response carried a status outside `200..300`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unexpected HTTP status {0}")]
pub struct UnexpectedStatus(pub u16);

/// Errors returned by [`Client`](crate::client::Client) sends.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The transport succeeded but returned no body.
    #[error("response contained no data")]
    NilData,

    /// The response could not be read as an HTTP response (no status line).
    #[error("response is not a valid HTTP response")]
    InvalidHttpResponse,

    /// A decision rejected the response. `source` is the underlying cause
    /// (status check, decoding, business rule).
    #[error("HTTP {status}: {source}")]
    Response {
        status: u16,
        #[source]
        source: BoxError,
    },

    /// A parameter or request adapter failed while building the request.
    #[error("adapter failed: {0}")]
    Adapter(#[from] AdapterError),

    /// The transport could not complete the round-trip.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// `base_url` and `path` did not resolve to a usable URL.
    #[error("invalid request URL: {0}")]
    InvalidUrl(String),

    /// The send was cancelled through its handle.
    #[error("request was cancelled")]
    Cancelled,
}

impl ApiError {
    /// Wrap a decision-level failure together with the response status.
    pub fn response(status: u16, source: impl Into<BoxError>) -> Self {
        ApiError::Response {
            status,
            source: source.into(),
        }
    }

    /// HTTP status attached to the error, if a response was received.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Response { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the failure came from decoding the response body.
    pub fn is_decode(&self) -> bool {
        match self {
            ApiError::Response { source, .. } => source.is::<serde_json::Error>(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_error_exposes_status() {
        let err = ApiError::response(503, UnexpectedStatus(503));
        assert_eq!(err.status(), Some(503));
        assert_eq!(err.to_string(), "HTTP 503: unexpected HTTP status 503");
        assert!(!err.is_decode());
    }

    #[test]
    fn decode_failures_are_detectable() {
        let decode = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = ApiError::response(200, decode);
        assert!(err.is_decode());
    }

    #[test]
    fn adapter_errors_convert() {
        let err: ApiError = AdapterError::Custom("missing signature".to_string()).into();
        assert!(matches!(err, ApiError::Adapter(AdapterError::Custom(_))));
        assert_eq!(err.status(), None);
    }
}
