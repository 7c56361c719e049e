//! Connection management for TrustGate.
//!
//! Every accepted connection owns a [`ConnectionGuard`] for as long as its task
//! runs. The tracker counts live guards so shutdown can wait for keep-alive
//! connections to drain, and the limiter caps how many exist at once.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Default)]
struct TrackerState {
    active: AtomicUsize,
    drained: Notify,
}

/// Tracks live connections for graceful shutdown.
#[derive(Debug, Clone, Default)]
pub struct ConnectionTracker {
    state: Arc<TrackerState>,
}

impl ConnectionTracker {
    /// Create a new connection tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection; it stays counted until the guard is dropped.
    pub fn track(&self) -> ConnectionGuard {
        self.state.active.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard {
            state: Arc::clone(&self.state),
            _permit: None,
        }
    }

    /// Get current live connection count.
    pub fn count(&self) -> usize {
        self.state.active.load(Ordering::SeqCst)
    }

    /// Wait for all connections to finish, at most `timeout`.
    /// Returns true if all connections finished, false if timeout reached.
    pub async fn wait_for_shutdown(&self, timeout: Duration) -> bool {
        let drained = async {
            loop {
                let notified = self.state.drained.notified();
                if self.count() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, drained).await.is_ok()
    }
}

/// Keeps one connection counted, and holds its limiter permit if any.
#[derive(Debug)]
pub struct ConnectionGuard {
    state: Arc<TrackerState>,
    _permit: Option<OwnedSemaphorePermit>,
}

impl ConnectionGuard {
    /// Attaches a limiter permit, released together with the guard.
    pub fn with_permit(mut self, permit: Option<OwnedSemaphorePermit>) -> Self {
        self._permit = permit;
        self
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        if self.state.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.state.drained.notify_waiters();
        }
    }
}

/// Caps the number of concurrent connections.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    semaphore: Option<Arc<Semaphore>>,
    max_connections: usize,
}

impl ConnectionLimiter {
    /// Create a new connection limiter.
    /// If max_connections is 0, no limit is enforced.
    pub fn new(max_connections: usize) -> Self {
        let semaphore = (max_connections > 0).then(|| Arc::new(Semaphore::new(max_connections)));
        Self {
            semaphore,
            max_connections,
        }
    }

    /// Check if connection limiting is enabled.
    pub fn is_enabled(&self) -> bool {
        self.semaphore.is_some()
    }

    /// Get the maximum number of connections (0 means unlimited).
    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    /// Try to admit a connection.
    ///
    /// Returns `Ok(None)` when unlimited, `Ok(Some(permit))` when admitted,
    /// and `Err(())` when at capacity.
    #[allow(clippy::result_unit_err)]
    pub fn try_admit(&self) -> Result<Option<OwnedSemaphorePermit>, ()> {
        match &self.semaphore {
            None => Ok(None),
            Some(sem) => Arc::clone(sem).try_acquire_owned().map(Some).map_err(|_| ()),
        }
    }
}
