//! Background lane executor.
//!
//! Each lane is one spawned task that works through its units in order.
//! The executor owns the lanes' lifecycle: [`Executor::drain`] waits for
//! them all, [`Executor::shutdown`] asks them to stop picking up new units
//! and waits up to a deadline.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

/// Outcome of [`Executor::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Whether every lane finished before the deadline.
    pub clean: bool,
    /// Lanes still running when the deadline passed.
    pub lanes_remaining: usize,
}

#[derive(Debug)]
pub struct Executor {
    tracker: TaskTracker,
    cancel: CancellationToken,
    accepting: AtomicBool,
}

impl Executor {
    /// Create a running executor.
    pub fn start() -> Self {
        Self {
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            accepting: AtomicBool::new(true),
        }
    }

    /// Whether new batches may be submitted.
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Lanes currently running.
    pub fn active_lanes(&self) -> usize {
        self.tracker.len()
    }

    /// Spawn one lane. The lane receives the shutdown token and must check
    /// it before starting each unit. A lane spawned after shutdown sees the
    /// token already cancelled.
    pub fn spawn_lane<F, Fut>(&self, lane: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.tracker.spawn(lane(self.cancel.clone()));
    }

    /// Stop accepting batches and wait for every lane to finish.
    pub async fn drain(&self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.tracker.close();
        tracing::info!(lanes = self.tracker.len(), "Draining generation lanes");
        self.tracker.wait().await;
        tracing::info!("Generation lanes drained");
    }

    /// Stop accepting batches, signal lanes to abandon units they have not
    /// started, and wait up to `timeout` for running units to finish.
    pub async fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        self.accepting.store(false, Ordering::SeqCst);
        self.cancel.cancel();
        self.tracker.close();

        tracing::info!(lanes = self.tracker.len(), "Shutting down generation executor");
        match tokio::time::timeout(timeout, self.tracker.wait()).await {
            Ok(()) => ShutdownReport {
                clean: true,
                lanes_remaining: 0,
            },
            Err(_) => {
                let remaining = self.tracker.len();
                tracing::warn!(
                    lanes_remaining = remaining,
                    timeout_secs = timeout.as_secs(),
                    "Generation lanes still running at shutdown deadline",
                );
                ShutdownReport {
                    clean: false,
                    lanes_remaining: remaining,
                }
            }
        }
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::start()
    }
}
