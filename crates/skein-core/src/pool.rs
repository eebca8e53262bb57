//! Pool - N workers pulling from one queue.
//!
//! Each worker loops `next` → run → `complete`. The job runs in a task of its
//! own, so a panic comes back as a `JoinError` instead of taking the worker
//! down with it.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::PoolConfig;
use crate::error::{Result, SkeinError};
use crate::job::{Job, JobContext};
use crate::queue::{Dispatch, Queue};

/// Worker counters shared between the handle and the workers.
#[derive(Default)]
struct Shared {
    /// Requested size.
    target: AtomicUsize,
    /// Workers currently looping.
    active: AtomicUsize,
    next_worker_id: AtomicUsize,
    started: AtomicBool,
}

impl Shared {
    /// Claim one retirement slot if more workers run than requested. A
    /// successful claim has already given up the worker's `active` count.
    fn try_retire(&self) -> bool {
        let mut active = self.active.load(Ordering::SeqCst);
        while active > self.target.load(Ordering::SeqCst) {
            match self.active.compare_exchange(
                active,
                active - 1,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => return true,
                Err(current) => active = current,
            }
        }
        false
    }
}

/// One unit of `active`, given back on drop unless the worker retired.
///
/// Dropping also covers a worker task that unwinds out of the queue.
struct ActiveSlot {
    shared: Arc<Shared>,
    held: bool,
}

impl ActiveSlot {
    /// Count one more active worker.
    fn acquire(shared: Arc<Shared>) -> Self {
        shared.active.fetch_add(1, Ordering::SeqCst);
        Self { shared, held: true }
    }

    fn retire(&mut self) -> bool {
        if self.held && self.shared.try_retire() {
            self.held = false;
        }
        !self.held
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        if self.held {
            self.shared.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Worker pool handle.
/// - `cancel()` stops every worker from taking new jobs and signals the
///   context of the jobs in flight
/// - `wait()` returns once every worker has exited
pub struct Pool {
    queue: Arc<dyn Queue>,
    config: PoolConfig,
    cancel_tx: watch::Sender<bool>,
    shared: Arc<Shared>,
    joins: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl Pool {
    pub fn new(queue: Arc<dyn Queue>, config: PoolConfig) -> Self {
        let (cancel_tx, _) = watch::channel(false);
        let shared = Shared::default();
        shared.target.store(config.workers, Ordering::SeqCst);
        Self {
            queue,
            config,
            cancel_tx,
            shared: Arc::new(shared),
            joins: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Spawn the workers. Must be called inside a Tokio runtime.
    pub fn start(&self) -> Result<()> {
        if self.shared.started.swap(true, Ordering::SeqCst) {
            return Err(SkeinError::PoolAlreadyStarted);
        }
        let n = self.size();
        info!(workers = n, "pool starting");
        for _ in 0..n {
            self.spawn_worker();
        }
        Ok(())
    }

    /// Wait for every worker to exit: the queue drained, the pool was
    /// cancelled, or all workers were retired by `set_size(0)`.
    pub async fn wait(&self) {
        loop {
            let joins = std::mem::take(&mut *self.joins.lock().unwrap_or_else(PoisonError::into_inner));
            if joins.is_empty() {
                break;
            }
            for join in joins {
                if let Err(err) = join.await {
                    warn!(error = %err, "worker task ended abnormally");
                }
            }
        }
        info!("pool stopped");
    }

    /// Change the number of workers.
    ///
    /// Growing spawns workers right away; shrinking retires workers as they
    /// come back for their next job, never in the middle of one.
    pub fn set_size(&self, n: usize) {
        let previous = self.shared.target.swap(n, Ordering::SeqCst);
        info!(from = previous, to = n, "pool resized");
        if !self.shared.started.load(Ordering::SeqCst) || self.is_cancelled() {
            return;
        }
        let active = self.shared.active.load(Ordering::SeqCst);
        for _ in active..n {
            self.spawn_worker();
        }
    }

    /// Stop taking new jobs and cancel the context of running ones.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
        info!("pool cancelled");
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_tx.borrow()
    }

    /// Requested number of workers.
    pub fn size(&self) -> usize {
        self.shared.target.load(Ordering::SeqCst)
    }

    /// Workers currently running, which lags `size()` while shrinking.
    pub fn active_workers(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    fn spawn_worker(&self) {
        let worker_id = self.shared.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let worker = Worker {
            id: worker_id,
            queue: Arc::clone(&self.queue),
            slot: ActiveSlot::acquire(Arc::clone(&self.shared)),
            config: self.config.clone(),
            cancel_rx: self.cancel_tx.subscribe(),
        };
        let join = tokio::spawn(worker.run());
        self.joins
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(join);
    }
}

impl Drop for Pool {
    fn drop(&mut self) {
        self.cancel_tx.send_replace(true);
    }
}

struct Worker {
    id: usize,
    queue: Arc<dyn Queue>,
    slot: ActiveSlot,
    config: PoolConfig,
    cancel_rx: watch::Receiver<bool>,
}

impl Worker {
    async fn run(mut self) {
        debug!(worker_id = self.id, "worker started");
        let (min_backoff, max_backoff) = self.config.idle_backoff();
        let mut backoff = min_backoff;
        loop {
            if *self.cancel_rx.borrow() {
                break;
            }
            if self.slot.retire() {
                info!(worker_id = self.id, "worker retired");
                return;
            }

            match self.queue.next().await {
                Dispatch::Drained => break,
                Dispatch::Idle => {
                    let delay = jitter(backoff);
                    tokio::select! {
                        changed = self.cancel_rx.changed() => {
                            // sender gone: the pool handle was dropped
                            if changed.is_err() {
                                break;
                            }
                        }
                        _ = self.queue.wait_for_change(delay) => {}
                    }
                    backoff = (backoff * 2).min(max_backoff);
                }
                Dispatch::Ready(job) => {
                    backoff = min_backoff;
                    self.execute(job).await;
                }
            }
        }
        debug!(worker_id = self.id, "worker stopped");
    }

    /// Run one attempt and report it to the queue.
    async fn execute(&self, job: Box<dyn Job>) {
        let job_id = job.id().to_string();
        let errors_before = job.base().errors.len();

        let mut ctx = JobContext::new(self.cancel_rx.clone()).with_worker(self.id);
        if let Some(limit) = job.time_info().max_time() {
            ctx = ctx.with_timeout(limit);
        }
        if let Some(limit) = self.config.job_timeout {
            ctx = ctx.with_timeout(limit);
        }
        debug!(job_id = %job_id, worker_id = self.id, "running");

        // the slot survives a panic; the tokio mutex does not poison
        let slot = Arc::new(Mutex::new(Some(job)));
        let task = {
            let slot = Arc::clone(&slot);
            tokio::spawn(async move {
                let mut guard = slot.lock().await;
                if let Some(job) = guard.as_mut() {
                    job.run(&ctx).await;
                }
            })
        };
        let joined = task.await;

        let Some(mut job) = slot.lock().await.take() else {
            warn!(job_id = %job_id, worker_id = self.id, "job lost during execution");
            return;
        };

        let outcome = match joined {
            Err(err) if err.is_panic() => {
                let message = panic_message(err.into_panic());
                warn!(job_id = %job_id, worker_id = self.id, panic = %message, "job panicked");
                job.base_mut().add_error(Some(format!("panic: {message}")));
                Err(SkeinError::execution(format!("panic: {message}")))
            }
            Err(err) => {
                job.base_mut().add_error(Some(format!("job task aborted: {err}")));
                Err(SkeinError::execution(err.to_string()))
            }
            Ok(()) if job.base().errors.len() > errors_before => Err(SkeinError::execution(
                job.base().errors[errors_before..].join("\n"),
            )),
            Ok(()) => Ok(()),
        };

        // the queue tracks the job by the id it handed out
        if job.id() != job_id {
            warn!(job_id = %job_id, renamed = %job.id(), worker_id = self.id, "job changed its id while running");
            job.base_mut().set_id(job_id.clone());
        }

        match self.queue.complete(job, outcome).await {
            Ok(completion) => {
                debug!(job_id = %job_id, worker_id = self.id, ?completion, "reported")
            }
            Err(err) => {
                warn!(job_id = %job_id, worker_id = self.id, error = %err, "completion rejected")
            }
        }
    }
}

/// Random delay in `[backoff/2, backoff]`.
fn jitter(backoff: Duration) -> Duration {
    let factor: f64 = rand::thread_rng().gen_range(0.5..=1.0);
    backoff.mul_f64(factor)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
