//! Job record: bookkeeping + the job itself while the queue holds it.

use std::time::Instant;

use super::JobState;
use crate::job::Job;

/// Queue-side metadata for one submitted job.
///
/// - This is the single source of truth for a job's state.
/// - `job` is `None` exactly while the job is dispatched: the worker owns it.
/// - All state transitions happen here.
#[derive(Debug)]
pub struct JobRecord {
    pub id: String,
    pub state: JobState,

    /// Submission order, tie-breaker among equal priorities.
    pub seq: u64,
    pub priority: i32,

    /// Number of times this job has been dispatched.
    pub attempts: u32,
    pub max_attempts: u32,

    pub last_error: Option<String>,

    /// Not eligible before this instant (retry backoff).
    pub next_run_at: Option<Instant>,

    job: Option<Box<dyn Job>>,

    /// Error list as of the last time the queue held the job.
    errors: Vec<String>,
}

impl JobRecord {
    pub fn new(job: Box<dyn Job>, max_attempts: u32, seq: u64) -> Self {
        Self {
            id: job.id().to_string(),
            state: JobState::Pending,
            seq,
            priority: job.priority(),
            attempts: 0,
            max_attempts,
            last_error: None,
            next_run_at: None,
            errors: job.base().errors.clone(),
            job: Some(job),
        }
    }

    pub fn job(&self) -> Option<&dyn Job> {
        self.job.as_deref()
    }

    /// Errors of the job, live if the queue holds it, else the last snapshot.
    pub fn errors(&self) -> &[String] {
        match &self.job {
            Some(job) => &job.base().errors,
            None => &self.errors,
        }
    }

    /// True while a retry backoff is still running.
    pub fn is_backing_off(&self, now: Instant) -> bool {
        self.next_run_at.is_some_and(|at| at > now)
    }

    /// Hand the job to a worker (increment attempts).
    pub fn start_attempt(&mut self) -> Option<Box<dyn Job>> {
        let job = self.job.take()?;
        self.errors = job.base().errors.clone();
        self.state = JobState::Dispatched;
        self.attempts += 1;
        self.next_run_at = None;
        Some(job)
    }

    pub fn mark_completed(&mut self, job: Box<dyn Job>) {
        self.state = JobState::Completed;
        self.store(job);
    }

    /// Mark as failed for good.
    pub fn mark_failed(&mut self, job: Box<dyn Job>, error: String) {
        self.state = JobState::Failed;
        self.last_error = Some(error);
        self.store(job);
    }

    /// Complete without running: the dependency reported nothing left to do.
    pub fn mark_passed(&mut self) {
        if let Some(job) = self.job.as_mut() {
            job.mark_complete();
        }
        self.state = JobState::Completed;
    }

    /// Fail a job that never left the queue. The reason is recorded on the
    /// job too, so an export shows why it never ran.
    pub fn reject(&mut self, error: String) {
        if let Some(job) = self.job.as_mut() {
            job.base_mut().add_error(Some(&error));
            self.errors = job.base().errors.clone();
        }
        self.state = JobState::Failed;
        self.last_error = Some(error);
    }

    /// Back to pending, not eligible before `next_run_at`.
    pub fn schedule_retry(&mut self, job: Box<dyn Job>, next_run_at: Instant, error: String) {
        self.state = JobState::Pending;
        self.next_run_at = Some(next_run_at);
        self.last_error = Some(error);
        self.store(job);
    }

    fn store(&mut self, job: Box<dyn Job>) {
        self.errors = job.base().errors.clone();
        self.job = Some(job);
    }
}
