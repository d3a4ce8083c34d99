//! Cooperative cancellation scope.
//!
//! A [`CancelScope`] coordinates the lifetime of the two loops of one
//! connection: either loop (or the close-frame handler) may trigger it, and
//! every holder observes the trigger promptly. Triggering is idempotent.
//!
//! The same primitive backs server-level shutdown in `tether-server`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;

/// A cancellable execution scope shared between concurrent tasks.
///
/// Clones share the same underlying state; cancelling any clone cancels
/// them all.
///
/// # Example
///
/// ```rust
/// use tether_core::CancelScope;
///
/// let scope = CancelScope::new();
/// assert!(!scope.is_cancelled());
/// scope.trigger();
/// assert!(scope.is_cancelled());
/// ```
#[derive(Debug, Clone)]
pub struct CancelScope {
    /// Whether cancellation has been triggered.
    triggered: Arc<AtomicBool>,

    /// Broadcast sender notifying pending waiters.
    sender: broadcast::Sender<()>,
}

impl CancelScope {
    /// Creates a new, untriggered scope.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            sender,
        }
    }

    /// Triggers cancellation, waking all waiters. Idempotent.
    pub fn trigger(&self) {
        if self
            .triggered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            // No receivers is fine: late subscribers take the fast path.
            let _ = self.sender.send(());
        }
    }

    /// Returns `true` once the scope has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Creates a scope that is cancelled when this one is, but whose own
    /// cancellation does not propagate upward.
    ///
    /// The connection engine derives each connection's scope from the
    /// server's shutdown scope this way: stopping the server cancels every
    /// connection, closing one connection cancels nothing else.
    #[must_use]
    pub fn child(&self) -> CancelScope {
        let child = CancelScope::new();
        if self.is_cancelled() {
            child.trigger();
            return child;
        }
        let parent = self.clone();
        let linked = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = parent.cancelled() => linked.trigger(),
                // The watcher must not outlive the child it serves.
                () = linked.cancelled() => {}
            }
        });
        child
    }

    /// Completes when the scope is cancelled.
    ///
    /// Completes immediately if cancellation already happened. Safe to use
    /// inside `tokio::select!` at every loop iteration.
    pub async fn cancelled(&self) {
        if self.is_cancelled() {
            return;
        }
        let mut rx = self.sender.subscribe();
        // trigger() flips the flag before sending, so if the flag is still
        // unset here the notification cannot have passed our subscription.
        if self.is_cancelled() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for CancelScope {
    fn default() -> Self {
        Self::new()
    }
}
