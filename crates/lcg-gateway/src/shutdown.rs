//! Graceful shutdown coordination via `CancellationToken`.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::registry::LifetimeRegistry;

/// Summary of a graceful shutdown.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Lifetimes disposed by the registry drain.
    pub disposed: usize,
    /// Connection tasks that finished within the timeout.
    pub completed: usize,
    /// Connection tasks aborted after the timeout.
    pub aborted: usize,
}

/// Coordinates shutdown across the registry and all connection tasks.
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Get a clone of the root cancellation token.
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Token for a new session; cancelled when shutdown begins.
    pub fn session_token(&self) -> CancellationToken {
        self.token.child_token()
    }

    /// Initiate shutdown.
    pub fn shutdown(&self) {
        self.token.cancel();
    }

    /// Whether a shutdown has been initiated.
    pub fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Shut the gateway down.
    ///
    /// 1. Stop the registry accepting connections and dispose every lifetime
    /// 2. Cancel the root token (reaches sessions created from
    ///    [`session_token`](Self::session_token))
    /// 3. Wait up to `timeout` for the connection tasks, then abort the rest
    pub async fn graceful_shutdown<T>(
        &self,
        registry: &LifetimeRegistry,
        handles: Vec<JoinHandle<T>>,
        timeout: Duration,
    ) -> ShutdownReport
    where
        T: Send + 'static,
    {
        let disposed = registry.shutdown();
        self.shutdown();

        let total = handles.len();
        info!(
            task_count = total,
            timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            "waiting for connection tasks to complete"
        );

        let aborters: Vec<_> = handles.iter().map(JoinHandle::abort_handle).collect();
        let drain = futures::future::join_all(handles);

        let (completed, aborted) = if tokio::time::timeout(timeout, drain).await.is_ok() {
            (total, 0)
        } else {
            let pending: Vec<_> = aborters.iter().filter(|h| !h.is_finished()).collect();
            for handle in &pending {
                handle.abort();
            }
            warn!(
                aborted = pending.len(),
                "shutdown timed out after {timeout:?}, aborting remaining tasks"
            );
            (total - pending.len(), pending.len())
        };

        ShutdownReport {
            disposed,
            completed,
            aborted,
        }
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
