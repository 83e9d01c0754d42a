//! Graceful shutdown shared by the gateway and the delivery service.
//!
//! One [`ShutdownCoordinator`] per process. Listeners and per-connection
//! session loops hold a clone of its token and stop when it is cancelled;
//! the process then drains tracked tasks with a bounded wait.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Drain deadline used when the caller does not supply one.
pub const DEFAULT_DRAIN_TIMEOUT: Duration = Duration::from_secs(30);

/// Owns the process-wide cancellation token.
#[derive(Debug, Clone)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a coordinator with a fresh token.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Token observed by listeners and session loops.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Cancel the token. Idempotent.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether shutdown has begun.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolve once Ctrl-C arrives or the token is cancelled elsewhere.
    ///
    /// Cancels the token before returning in both cases.
    pub async fn wait_for_signal(&self) {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "failed to listen for ctrl-c, shutting down");
                } else {
                    info!("ctrl-c received, shutting down");
                }
            }
            () = self.token.cancelled() => {}
        }
        self.shutdown();
    }

    /// Cancel the token, then wait up to `timeout` for `handles` to finish.
    ///
    /// Tasks still running after the deadline are left to the runtime.
    pub async fn drain(&self, handles: Vec<JoinHandle<()>>, timeout: Option<Duration>) {
        let timeout = timeout.unwrap_or(DEFAULT_DRAIN_TIMEOUT);

        self.shutdown();
        info!(
            task_count = handles.len(),
            timeout_secs = timeout.as_secs(),
            "draining listener tasks"
        );

        if tokio::time::timeout(timeout, futures::future::join_all(handles))
            .await
            .is_err()
        {
            warn!(?timeout, "drain deadline passed with tasks still running");
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_coordinator_is_running() {
        let coord = ShutdownCoordinator::default();
        assert!(!coord.is_shutting_down());
        assert!(!coord.token().is_cancelled());
    }

    #[test]
    fn shutdown_cancels_every_token_clone() {
        let coord = ShutdownCoordinator::new();
        let a = coord.token();
        let b = coord.clone().token();
        coord.shutdown();
        coord.shutdown();
        assert!(a.is_cancelled());
        assert!(b.is_cancelled());
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn wait_for_signal_returns_when_cancelled_elsewhere() {
        let coord = ShutdownCoordinator::new();
        let other = coord.clone();
        let waiter = tokio::spawn(async move { other.wait_for_signal().await });
        coord.shutdown();
        waiter.await.unwrap();
        assert!(coord.is_shutting_down());
    }

    #[tokio::test]
    async fn drain_waits_for_cooperative_tasks() {
        let coord = ShutdownCoordinator::new();
        let token = coord.token();
        let handle = tokio::spawn(async move { token.cancelled().await });

        coord.drain(vec![handle], None).await;
        assert!(coord.is_shutting_down());
    }

    #[tokio::test(start_paused = true)]
    async fn drain_gives_up_after_deadline() {
        let coord = ShutdownCoordinator::new();
        let stubborn = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(300)).await;
        });

        coord
            .drain(vec![stubborn], Some(Duration::from_millis(100)))
            .await;
        assert!(coord.is_shutting_down());
    }
}
