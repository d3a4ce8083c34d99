//! Graceful shutdown support.
//!
//! The server's shutdown state is a plain [`CancelScope`]; this module adds
//! the pieces around it: tracking in-flight connections so `start` can
//! drain before returning, and wiring OS signals to the scope.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tether_core::CancelScope;

/// Tracks active connections during shutdown.
///
/// Each accepted connection holds a [`ConnectionToken`]; when the last
/// token drops, [`ConnectionTracker::drained`] completes.
///
/// ```rust
/// use tether_server::shutdown::ConnectionTracker;
///
/// let tracker = ConnectionTracker::new();
/// let token = tracker.acquire();
/// assert_eq!(tracker.active(), 1);
/// drop(token);
/// assert_eq!(tracker.active(), 0);
/// ```
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl ConnectionTracker {
    /// Creates a tracker with no active connections.
    #[must_use]
    pub fn new() -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            notify: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Acquires a token for one connection.
    #[must_use]
    pub fn acquire(&self) -> ConnectionToken {
        self.active.fetch_add(1, Ordering::SeqCst);
        ConnectionToken {
            active: Arc::clone(&self.active),
            notify: Arc::clone(&self.notify),
        }
    }

    /// Returns the number of active connections.
    #[must_use]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    /// Completes once every token has been dropped. Completes immediately
    /// when nothing is active.
    pub async fn drained(&self) {
        while self.active.load(Ordering::SeqCst) > 0 {
            self.notify.notified().await;
        }
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// A token held for the lifetime of one connection.
#[derive(Debug)]
pub struct ConnectionToken {
    active: Arc<AtomicUsize>,
    notify: Arc<tokio::sync::Notify>,
}

impl Drop for ConnectionToken {
    fn drop(&mut self) {
        if self.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.notify.notify_waiters();
        }
    }
}

/// Triggers `scope` when the process receives SIGTERM or SIGINT.
///
/// # Panics
///
/// Panics if signal handlers cannot be registered.
pub fn trigger_on_os_signals(scope: CancelScope) {
    tokio::spawn(async move {
        wait_for_os_signal().await;
        scope.trigger();
    });
}

/// Waits for SIGTERM or SIGINT (Ctrl+C on non-Unix platforms).
async fn wait_for_os_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm =
            signal(SignalKind::terminate()).expect("failed to register SIGTERM handler");
        let mut sigint =
            signal(SignalKind::interrupt()).expect("failed to register SIGINT handler");

        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
            _ = sigint.recv() => {
                tracing::info!("received SIGINT, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to wait for Ctrl+C");
        tracing::info!("received Ctrl+C, shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn tracker_counts_tokens() {
        let tracker = ConnectionTracker::new();
        let a = tracker.acquire();
        let b = tracker.acquire();
        assert_eq!(tracker.active(), 2);
        drop(a);
        assert_eq!(tracker.active(), 1);
        drop(b);
        assert_eq!(tracker.active(), 0);
    }

    #[tokio::test]
    async fn drained_completes_immediately_when_idle() {
        let tracker = ConnectionTracker::new();
        tokio::time::timeout(Duration::from_millis(10), tracker.drained())
            .await
            .expect("drained should complete immediately");
    }

    #[tokio::test]
    async fn drained_completes_after_last_drop() {
        let tracker = ConnectionTracker::new();
        let token = tracker.acquire();

        let waiter = tracker.clone();
        let wait = tokio::spawn(async move { waiter.drained().await });

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            drop(token);
        });

        tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .expect("drained should complete")
            .expect("task should not panic");
    }
}
