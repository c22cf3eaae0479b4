//! Per-attempt log snapshots and the observers that receive them.
//!
//! Log decisions run once per attempt, right after the transport returns and
//! before the decision chain starts. They only observe: a failing or
//! panicking log decision never changes the outcome of a send.

use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::BoxError;
use crate::http::HttpRequest;

/// Immutable record of one attempt.
#[derive(Debug, Clone)]
pub struct LogInfo {
    pub attempt_id: Uuid,
    /// When preparation of this attempt started.
    pub created_at: DateTime<Utc>,
    /// When the request was handed to the transport.
    pub dispatched_at: DateTime<Utc>,
    /// When the transport returned.
    pub received_at: DateTime<Utc>,
    pub request: HttpRequest,
    pub status: Option<u16>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub error: Option<String>,
}

impl LogInfo {
    /// Time spent in the transport. Zero if the clock went backwards.
    pub fn elapsed(&self) -> Duration {
        (self.received_at - self.dispatched_at)
            .to_std()
            .unwrap_or_default()
    }

    /// One-line summary, e.g. `GET https://api.test/users -> 200 (12 ms, 84 bytes)`.
    pub fn summary(&self) -> String {
        let outcome = match (&self.error, self.status) {
            (Some(err), _) => format!("failed: {err}"),
            (None, Some(status)) => status.to_string(),
            (None, None) => "non-HTTP response".to_string(),
        };
        let size = self.body.as_ref().map_or(0, Vec::len);
        format!(
            "{} {} -> {} ({} ms, {} bytes)",
            self.request.method.as_str(),
            self.request.url,
            outcome,
            self.elapsed().as_millis(),
            size
        )
    }
}

/// Side-effect-only observer of a finished attempt.
pub trait LogDecision: Send + Sync {
    fn log(&self, info: &LogInfo) -> Result<(), BoxError>;
}

/// Writes every attempt to the `log` facade: a summary at `debug`, the body
/// text at `trace`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DebugLogDecision;

impl LogDecision for DebugLogDecision {
    fn log(&self, info: &LogInfo) -> Result<(), BoxError> {
        log::debug!("[{}] {}", info.attempt_id, info.summary());
        if log::log_enabled!(log::Level::Trace) {
            if let Some(body) = &info.request.body {
                let text = String::from_utf8_lossy(body);
                log::trace!("[{}] request body: {text}", info.attempt_id);
            }
            if let Some(body) = &info.body {
                let text = String::from_utf8_lossy(body);
                log::trace!("[{}] response body: {text}", info.attempt_id);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeDelta;
    use url::Url;

    use super::*;

    fn info(status: Option<u16>, error: Option<&str>) -> LogInfo {
        let start = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        LogInfo {
            attempt_id: Uuid::nil(),
            created_at: start,
            dispatched_at: start,
            received_at: start + TimeDelta::milliseconds(12),
            request: HttpRequest::new(Url::parse("https://api.test/users").unwrap()),
            status,
            headers: Vec::new(),
            body: Some(b"[]".to_vec()),
            error: error.map(str::to_string),
        }
    }

    #[test]
    fn elapsed_measures_transport_time() {
        assert_eq!(info(Some(200), None).elapsed(), Duration::from_millis(12));
    }

    #[test]
    fn summary_describes_outcome() {
        assert_eq!(
            info(Some(200), None).summary(),
            "GET https://api.test/users -> 200 (12 ms, 2 bytes)"
        );
        let summary = info(None, Some("connection refused")).summary();
        assert!(summary.contains("failed: connection refused"));
        assert!(info(None, None).summary().contains("non-HTTP response"));
    }

    #[test]
    fn debug_log_never_fails() {
        assert!(DebugLogDecision.log(&info(Some(500), None)).is_ok());
    }
}
