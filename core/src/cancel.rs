//! Per-send cancellation.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::watch;

use crate::error::ApiError;

/// Cloneable handle that cancels one send.
///
/// Cancelling aborts whatever the send is waiting on (the transport call or
/// an asynchronous decision) and suppresses delivery of its result.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    state: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (state, _) = watch::channel(false);
        Self {
            state: Arc::new(state),
        }
    }

    pub fn cancel(&self) {
        self.state.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.state.borrow()
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let mut rx = self.state.subscribe();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn guard<F: Future>(
    cancel: Option<&CancelHandle>,
    fut: F,
) -> Result<F::Output, ApiError> {
    match cancel {
        None => Ok(fut.await),
        Some(cancel) => tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ApiError::Cancelled),
            out = fut => Ok(out),
        },
    }
}
