//! Queue module: job states, retry logic, and the in-memory implementation.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryQueue;
pub use record::JobRecord;
pub use retry::{DEFAULT_MAX_DELAY, RetryPolicy};
pub use state::JobState;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::job::Job;
pub use crate::observability::QueueStats;

/// Result of asking the queue for work.
#[derive(Debug)]
pub enum Dispatch {
    /// A ready job; the caller now owns it and must `complete` it.
    Ready(Box<dyn Job>),

    /// Nothing ready right now. Try again later.
    Idle,

    /// Closed, nothing dispatched, nothing left that could run.
    Drained,
}

/// What the queue did with a completed job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Completed,

    /// Back to pending, eligible again after `delay`.
    Retrying { attempts: u32, delay: Duration },

    /// Moved to the failed set for good.
    Failed { attempts: u32 },
}

/// Point-in-time view of one tracked job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub id: String,
    pub state: JobState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub errors: Vec<String>,
    pub last_error: Option<String>,
}

/// Queue port (interface).
///
/// The queue decides which job runs next and where it goes afterwards; the
/// pool only executes. Implementations serialize `next` and `complete` so a
/// dispatched job is owned by exactly one worker.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Submit a job.
    ///
    /// Fails with `DuplicateId` if the ID is tracked in any state,
    /// `QueueClosed` after `close`, and `DependencyCycle` if the job's edges
    /// would close a cycle.
    async fn put(&self, job: Box<dyn Job>) -> Result<()>;

    /// Highest-priority ready job, earliest submission first among equals.
    async fn next(&self) -> Dispatch;

    /// Report the outcome of a dispatched job.
    async fn complete(&self, job: Box<dyn Job>, outcome: Result<()>) -> Result<Completion>;

    async fn stats(&self) -> QueueStats;

    /// Refuse new jobs; `next` reports `Drained` once the rest is done.
    async fn close(&self);

    async fn is_closed(&self) -> bool;

    async fn status(&self, id: &str) -> Option<JobStatus>;

    /// Export a job the queue currently holds (not while dispatched).
    async fn export_job(&self, id: &str) -> Result<Vec<u8>>;

    /// Wait until queue state may have changed, at most `timeout`.
    async fn wait_for_change(&self, timeout: Duration) {
        tokio::time::sleep(timeout).await;
    }
}
