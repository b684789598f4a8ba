//! Tracking of background work started while serving.
//!
//! Anything spawned through [`BackgroundTasks`] is awaited by
//! [`BackgroundTasks::drain`] before the process exits.

use std::future::Future;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

/// Shared wait-group for background tasks
///
/// Clones share the same set of tasks.
#[derive(Clone, Debug, Default)]
pub struct BackgroundTasks {
    tracker: TaskTracker,
}

impl BackgroundTasks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a task that shutdown will wait for
    pub fn spawn<F>(&self, task: F) -> JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tracker.spawn(task)
    }

    /// Number of tasks still running
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Whether [`drain`](Self::drain) has been called
    pub fn is_draining(&self) -> bool {
        self.tracker.is_closed()
    }

    /// Close the tracker and wait up to `timeout` for running tasks.
    ///
    /// Returns `true` when every task finished in time.
    pub async fn drain(&self, timeout: Duration) -> bool {
        self.tracker.close();
        let pending = self.tracker.len();
        if pending > 0 {
            info!(pending, ?timeout, "Waiting for background tasks");
        }

        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => true,
            Err(_) => {
                warn!(
                    pending = self.tracker.len(),
                    "Background tasks exceeded timeout of {:?}",
                    timeout
                );
                false
            }
        }
    }
}
