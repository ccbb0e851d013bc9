//! Graceful shutdown coordination via `CancellationToken`.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio_util::task::task_tracker::TrackedFuture;
use tracing::{info, warn};

/// Default timeout for graceful shutdown before giving up on handlers.
const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Signals shutdown to every session handler and waits for them to finish.
pub struct ShutdownCoordinator {
    token: CancellationToken,
    tracker: TaskTracker,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
            tracker: TaskTracker::new(),
        }
    }

    /// Get a clone of the cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wrap a handler future so shutdown waits for it.
    pub fn track<F: Future>(&self, fut: F) -> TrackedFuture<F> {
        self.tracker.track_future(fut)
    }

    /// Number of tracked handlers still running.
    pub fn active(&self) -> usize {
        self.tracker.len()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Cancel the token, then wait up to `timeout` for tracked handlers.
    ///
    /// Returns `true` if every handler finished in time.
    pub async fn graceful_shutdown(&self, timeout: Option<Duration>) -> bool {
        let timeout = timeout.unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT);

        self.shutdown();
        let _ = self.tracker.close();
        info!(
            task_count = self.tracker.len(),
            timeout_secs = timeout.as_secs(),
            "waiting for session handlers to complete"
        );

        if tokio::time::timeout(timeout, self.tracker.wait()).await.is_err() {
            warn!("shutdown timed out after {timeout:?}, some handlers may still be running");
            return false;
        }
        true
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
