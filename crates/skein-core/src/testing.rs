//! Scriptable job for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::dependency::JobEdges;
use crate::error::Result;
use crate::job::{Job, JobBase, JobContext, JobType, codec};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Behavior {
    #[default]
    Succeed,
    Fail,
    /// Fail the first `n` runs, then succeed.
    FailTimes(u32),
    Panic,
    /// Sleep, then succeed.
    Sleep(u64),
    /// Record an error once the context is cancelled.
    WaitForCancel,
    /// Change its own id, then succeed.
    Rename,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct TestJob {
    #[serde(flatten)]
    base: JobBase,
    pub behavior: Behavior,
    #[serde(skip)]
    runs: Arc<AtomicU32>,
}

impl TestJob {
    pub fn new(id: &str) -> Self {
        Self {
            base: JobBase::new(JobType::new("test", 0)).with_id(id),
            behavior: Behavior::Succeed,
            runs: Arc::default(),
        }
    }

    pub fn behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn after(mut self, edges: &[&str]) -> Self {
        self.base
            .set_dependency(Box::new(JobEdges::from_edges(edges.iter().copied())));
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.base.priority = priority;
        self
    }

    /// Shared run counter, still readable after the job is boxed away.
    pub fn runs(&self) -> Arc<AtomicU32> {
        Arc::clone(&self.runs)
    }

    pub fn boxed(self) -> Box<dyn Job> {
        Box::new(self)
    }
}

#[async_trait]
impl Job for TestJob {
    fn base(&self) -> &JobBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut JobBase {
        &mut self.base
    }

    async fn run(&mut self, ctx: &JobContext) {
        let n = self.runs.fetch_add(1, Ordering::SeqCst) + 1;
        match self.behavior {
            Behavior::Succeed => self.base.mark_complete(),
            Behavior::Fail => self.base.add_error(Some(format!("run {n} failed"))),
            Behavior::FailTimes(k) if n <= k => {
                self.base.add_error(Some(format!("run {n} failed")))
            }
            Behavior::FailTimes(_) => self.base.mark_complete(),
            Behavior::Panic => panic!("test job {} panicked", self.base.id),
            Behavior::Sleep(ms) => {
                tokio::time::sleep(Duration::from_millis(ms)).await;
                self.base.mark_complete();
            }
            Behavior::WaitForCancel => {
                ctx.cancelled().await;
                self.base.add_error(Some("cancelled"));
            }
            Behavior::Rename => {
                let renamed = format!("{}-renamed", self.base.id);
                self.base.set_id(renamed);
                self.base.mark_complete();
            }
        }
    }

    fn export(&self) -> Result<Vec<u8>> {
        codec::encode(self.base.job_type.format, self)
    }

    fn import(&mut self, bytes: &[u8]) -> Result<()> {
        *self = codec::decode(bytes)?;
        Ok(())
    }
}
