//! JobContext - cancellation and deadline handed to `Job::run`.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Execution context for one attempt of one job.
///
/// - `cancelled()` resolves when the pool is cancelled or the deadline passes.
/// - Jobs are expected to poll `is_cancelled()` or race `cancelled()` against
///   their own work; nothing here preempts a job.
#[derive(Debug, Clone)]
pub struct JobContext {
    cancel_rx: watch::Receiver<bool>,
    deadline: Option<Instant>,
    worker_id: Option<usize>,
}

impl JobContext {
    pub fn new(cancel_rx: watch::Receiver<bool>) -> Self {
        Self {
            cancel_rx,
            deadline: None,
            worker_id: None,
        }
    }

    /// A context that is never cancelled. Handy for running a job inline.
    pub fn background() -> Self {
        let (tx, rx) = watch::channel(false);
        // A closed channel keeps the last value; `cancelled()` treats a closed
        // sender as "never" rather than "now".
        drop(tx);
        Self::new(rx)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) if existing < at => existing,
            _ => at,
        });
        self
    }

    pub fn with_worker(mut self, worker_id: usize) -> Self {
        self.worker_id = Some(worker_id);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn worker_id(&self) -> Option<usize> {
        self.worker_id
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow() || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        let signal = async move {
            loop {
                if *rx.borrow_and_update() {
                    return;
                }
                if rx.changed().await.is_err() {
                    // sender gone without cancelling: wait forever
                    std::future::pending::<()>().await;
                }
            }
        };

        match self.deadline {
            Some(deadline) => {
                tokio::select! {
                    _ = signal => {},
                    _ = tokio::time::sleep_until(deadline) => {},
                }
            }
            None => signal.await,
        }
    }
}
