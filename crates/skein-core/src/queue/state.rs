//! Job state machine for the queue.

use serde::{Deserialize, Serialize};

use crate::dependency::EdgeStatus;

/// Which of the four disjoint sets a job is in.
///
/// State transitions:
/// - Pending -> Dispatched -> Completed
/// - Pending -> Dispatched -> Pending (retry, until max_attempts)
/// - Pending -> Dispatched -> Failed (max_attempts reached)
/// - Pending -> Completed (dependency `Passed`, never run)
/// - Pending -> Failed (dependency `Unresolved`, or stalled at drain)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Waiting for its dependency (or its retry backoff).
    Pending,

    /// Owned by exactly one worker.
    Dispatched,

    Completed,

    /// Failed permanently.
    Failed,
}

impl JobState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Is this job eligible for dispatch (subject to its dependency)?
    pub fn is_runnable(self) -> bool {
        matches!(self, JobState::Pending)
    }

    /// How a dependent job sees this one.
    pub fn edge_status(self) -> EdgeStatus {
        match self {
            JobState::Pending => EdgeStatus::Pending,
            JobState::Dispatched => EdgeStatus::Dispatched,
            JobState::Completed => EdgeStatus::Completed,
            JobState::Failed => EdgeStatus::Failed,
        }
    }
}
