//! The seam between the pipeline and the host's HTTP stack.
//!
//! The core never opens a socket. Hosts plug in a [`Transport`] that executes
//! a built `HttpRequest` and reports what came back, and a [`Clock`] that
//! timestamps attempts for log snapshots.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::TransportError;
use crate::http::{HttpRequest, RawResponse};

/// Executes one HTTP round-trip.
///
/// Implementations must report non-2xx statuses as data, not as `Err`; the
/// decision chain owns status interpretation. `Err` is for failures where no
/// response arrived (connection refused, DNS, timeout).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError>;
}

/// Source of wall-clock timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
