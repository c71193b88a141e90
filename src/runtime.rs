//! Cooperative cancellation and task tracking.
//!
//! A single [`StopSignal`] is shared by every task. Tasks observe it at their
//! suspension points and wind down on their own; nothing is aborted.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Process-wide stop flag.
#[derive(Debug, Clone)]
pub struct StopSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl Default for StopSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl StopSignal {
    pub fn new() -> Self {
        Self {
            tx: Arc::new(watch::Sender::new(false)),
        }
    }

    pub fn request_stop(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_stopped(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once stop has been requested.
    pub async fn stopped(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|stopped| *stopped).await;
    }

    /// Sleep for `duration` unless stopped first. Returns `true` only when the
    /// full duration elapsed and no stop was requested meanwhile; a timer
    /// that fires together with a stop request reports `false`.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            biased;
            _ = self.stopped() => false,
            _ = tokio::time::sleep(duration) => !self.is_stopped(),
        }
    }
}

/// Handles of spawned tasks, joined on shutdown.
#[derive(Debug, Clone, Default)]
pub struct TaskSet {
    handles: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl TaskSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn<F>(&self, fut: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(fut);
        self.handles().push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A panic while the lock was held leaves the list itself intact.
    fn handles(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for every tracked task, including ones spawned while joining.
    pub async fn join_all(&self) {
        loop {
            let batch: Vec<_> = self.handles().drain(..).collect();
            if batch.is_empty() {
                return;
            }
            for result in futures::future::join_all(batch).await {
                if let Err(err) = result {
                    tracing::error!(error = %err, "sync task panicked");
                }
            }
        }
    }
}
