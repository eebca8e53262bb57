//! In-memory queue implementation.

use std::cmp::Reverse;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, Notify};
use tracing::{debug, info, warn};

use super::{
    Completion, DEFAULT_MAX_DELAY, Dispatch, JobRecord, JobState, JobStatus, Queue, QueueStats, RetryPolicy,
};
use crate::config::QueueConfig;
use crate::dependency::{DependencyGraph, DependencyState, EdgeLookup, EdgeStatus, Scope};
use crate::error::{Result, SkeinError};
use crate::job::Job;

/// Edge lookup straight off the record table.
struct RecordView<'a>(&'a HashMap<String, JobRecord>);

impl EdgeLookup for RecordView<'_> {
    fn edge_status(&self, id: &str) -> EdgeStatus {
        self.0
            .get(id)
            .map_or(EdgeStatus::Unknown, |record| record.state.edge_status())
    }
}

/// In-memory queue state.
struct InMemoryQueueState {
    /// All job records (single source of truth).
    records: HashMap<String, JobRecord>,

    /// Edges of jobs that may still run, for cycle rejection.
    graph: DependencyGraph,

    next_seq: u64,

    closed: bool,

    retry_policy: RetryPolicy,
}

impl InMemoryQueueState {
    fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            records: HashMap::new(),
            graph: DependencyGraph::new(),
            next_seq: 0,
            closed: false,
            retry_policy,
        }
    }

    fn allocate_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    /// Record `id`'s edges, undoing them if they close a cycle.
    fn link(&mut self, id: &str, edges: &[String]) -> Result<()> {
        for edge in edges {
            self.graph.add_dependency(id, edge);
        }
        if let Some(cycle) = self.graph.detect_cycle_from(id) {
            for edge in edges {
                self.graph.remove_dependency(id, edge);
            }
            return Err(SkeinError::DependencyCycle(cycle));
        }
        Ok(())
    }

    /// Pending jobs not held back by a retry backoff or `wait_until`.
    fn is_eligible(record: &JobRecord, now: Instant) -> bool {
        record.state.is_runnable()
            && !record.is_backing_off(now)
            && record
                .job()
                .is_some_and(|job| !job.time_info().is_waiting(Utc::now()))
    }

    /// Evaluate the dependency of every eligible pending job.
    fn evaluate(&self, now: Instant) -> Vec<(String, DependencyState)> {
        let view = RecordView(&self.records);
        self.records
            .values()
            .filter(|record| Self::is_eligible(record, now))
            .filter_map(|record| {
                let job = record.job()?;
                let scope = Scope::new(job.completed(), &view);
                Some((record.id.clone(), job.dependency().state(&scope)))
            })
            .collect()
    }

    /// Move `Passed` jobs to completed and `Unresolved` jobs to failed until
    /// nothing changes. One settled job may unblock or doom its dependents,
    /// so this repeats.
    ///
    /// Returns the final verdicts and whether anything moved.
    fn settle(&mut self, now: Instant) -> (Vec<(String, DependencyState)>, bool) {
        let mut moved = false;
        loop {
            let verdicts = self.evaluate(now);
            let mut changed = false;
            for (id, verdict) in &verdicts {
                let Some(record) = self.records.get_mut(id) else {
                    continue;
                };
                match verdict {
                    DependencyState::Passed => {
                        debug!(job_id = %id, "dependency passed, completing without run");
                        record.mark_passed();
                        changed = true;
                    }
                    DependencyState::Unresolved => {
                        warn!(job_id = %id, "dependency unresolved, failing job");
                        record.reject(format!("job {id}: upstream dependency failed"));
                        changed = true;
                    }
                    DependencyState::Ready | DependencyState::Blocked => continue,
                }
                self.graph.remove_job(id);
            }
            if !changed {
                return (verdicts, moved);
            }
            moved = true;
        }
    }

    /// Hand out the best ready job: highest priority, then earliest submission.
    fn dispatch_best(&mut self, verdicts: &[(String, DependencyState)]) -> Option<Box<dyn Job>> {
        let id = verdicts
            .iter()
            .filter(|(_, verdict)| *verdict == DependencyState::Ready)
            .filter_map(|(id, _)| self.records.get(id))
            .min_by_key(|record| (Reverse(record.priority), record.seq))
            .map(|record| record.id.clone())?;

        let record = self.records.get_mut(&id)?;
        let job = record.start_attempt()?;
        debug!(job_id = %id, attempt = record.attempts, "dispatched");
        Some(job)
    }

    /// Once closed with nothing in flight, whatever is still pending and not
    /// merely waiting on a timer can never run. Fail it and report drained.
    fn drain_if_done(&mut self, now: Instant) -> bool {
        if !self.closed {
            return false;
        }
        let mut stalled = Vec::new();
        for record in self.records.values() {
            match record.state {
                JobState::Dispatched => return false,
                JobState::Pending if !Self::is_eligible(record, now) => return false,
                JobState::Pending => stalled.push(record.id.clone()),
                JobState::Completed | JobState::Failed => {}
            }
        }
        for id in stalled {
            if let Some(record) = self.records.get_mut(&id) {
                warn!(job_id = %id, "queue drained with job still blocked");
                record.reject(format!("job {id}: stalled, dependency can no longer be met"));
            }
            self.graph.remove_job(&id);
        }
        true
    }

    fn stats(&self) -> QueueStats {
        let mut stats = QueueStats::default();
        for record in self.records.values() {
            match record.state {
                JobState::Pending => stats.pending += 1,
                JobState::Dispatched => stats.dispatched += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        stats
    }
}

/// In-memory queue implementation.
///
/// One `tokio::sync::Mutex` serializes every state change; job code never
/// runs under it. Workers parked in `wait_for_change` are woken whenever a
/// put, completion, settlement or close may have made work available.
pub struct InMemoryQueue {
    state: Arc<Mutex<InMemoryQueueState>>,
    notify: Arc<Notify>,
}

impl InMemoryQueue {
    pub fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            state: Arc::new(Mutex::new(InMemoryQueueState::new(retry_policy))),
            notify: Arc::new(Notify::new()),
        }
    }

    pub fn from_config(config: &QueueConfig) -> Self {
        Self::new(config.retry.clone())
    }
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[async_trait]
impl Queue for InMemoryQueue {
    async fn put(&self, job: Box<dyn Job>) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            if state.closed {
                return Err(SkeinError::QueueClosed);
            }
            let id = job.id().to_string();
            if state.records.contains_key(&id) {
                return Err(SkeinError::DuplicateId(id));
            }
            let edges = job.dependency().edges().to_vec();
            state.link(&id, &edges)?;

            let seq = state.allocate_seq();
            let max_attempts = state.retry_policy.max_attempts;
            debug!(job_id = %id, priority = job.priority(), edges = edges.len(), "submitted");
            state.records.insert(id, JobRecord::new(job, max_attempts, seq));
        }
        self.notify.notify_waiters();
        Ok(())
    }

    async fn next(&self) -> Dispatch {
        let (dispatch, moved) = {
            let mut state = self.state.lock().await;
            let now = Instant::now();
            let (verdicts, moved) = state.settle(now);
            if let Some(job) = state.dispatch_best(&verdicts) {
                (Dispatch::Ready(job), moved)
            } else if state.drain_if_done(now) {
                (Dispatch::Drained, true)
            } else {
                (Dispatch::Idle, moved)
            }
        };
        if moved {
            self.notify.notify_waiters();
        }
        dispatch
    }

    async fn complete(&self, mut job: Box<dyn Job>, outcome: Result<()>) -> Result<Completion> {
        let completion = {
            let mut state = self.state.lock().await;
            let policy = state.retry_policy.clone();
            let id = job.id().to_string();
            let record = state
                .records
                .get_mut(&id)
                .ok_or_else(|| SkeinError::UnknownJob(id.clone()))?;
            if record.state != JobState::Dispatched {
                return Err(SkeinError::NotDispatched(id));
            }
            let attempts = record.attempts;

            let completion = match outcome {
                Ok(()) => {
                    job.mark_complete();
                    record.mark_completed(job);
                    info!(job_id = %id, attempt = attempts, "job completed");
                    Completion::Completed
                }
                Err(err) if job.completed() => {
                    // the job claims it is done; running it again cannot help
                    warn!(job_id = %id, attempt = attempts, error = %err, "completed job reported failure");
                    record.mark_failed(job, err.to_string());
                    Completion::Failed { attempts }
                }
                Err(err) if policy.allows_retry(attempts) => {
                    let delay = policy.next_delay(attempts);
                    let now = Instant::now();
                    let at = now
                        .checked_add(delay)
                        .or_else(|| now.checked_add(DEFAULT_MAX_DELAY))
                        .unwrap_or(now);
                    warn!(job_id = %id, attempt = attempts, ?delay, error = %err, "job failed, retrying");
                    record.schedule_retry(job, at, err.to_string());
                    Completion::Retrying { attempts, delay }
                }
                Err(err) => {
                    let exhausted = SkeinError::RetryExhausted {
                        id: id.clone(),
                        attempts,
                        last_error: err.to_string(),
                    };
                    warn!(job_id = %id, attempt = attempts, error = %err, "job failed permanently");
                    record.mark_failed(job, exhausted.to_string());
                    Completion::Failed { attempts }
                }
            };
            if record.state.is_terminal() {
                state.graph.remove_job(&id);
            }
            completion
        };
        self.notify.notify_waiters();
        Ok(completion)
    }

    async fn stats(&self) -> QueueStats {
        self.state.lock().await.stats()
    }

    async fn close(&self) {
        self.state.lock().await.closed = true;
        info!("queue closed");
        self.notify.notify_waiters();
    }

    async fn is_closed(&self) -> bool {
        self.state.lock().await.closed
    }

    async fn status(&self, id: &str) -> Option<JobStatus> {
        let state = self.state.lock().await;
        state.records.get(id).map(|record| JobStatus {
            id: record.id.clone(),
            state: record.state,
            attempts: record.attempts,
            max_attempts: record.max_attempts,
            errors: record.errors().to_vec(),
            last_error: record.last_error.clone(),
        })
    }

    /// Fails with `UnknownJob` if `id` is not tracked or is out with a worker.
    async fn export_job(&self, id: &str) -> Result<Vec<u8>> {
        let state = self.state.lock().await;
        state
            .records
            .get(id)
            .and_then(JobRecord::job)
            .ok_or_else(|| SkeinError::UnknownJob(id.to_string()))?
            .export()
    }

    async fn wait_for_change(&self, timeout: Duration) {
        tokio::select! {
            _ = self.notify.notified() => {},
            _ = tokio::time::sleep(timeout) => {},
        }
    }
}
