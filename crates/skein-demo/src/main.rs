use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use skein_core::dependency::JobEdges;
use skein_core::job::codec;
use skein_core::jobs::{SHELL_JOB, ShellJob};
use skein_core::{
    EngineConfig, InMemoryQueue, Job, JobBase, JobContext, JobType, Pool, Queue, Registry, Result,
};

const HELLO_JOB: &str = "hello";

/// Greets `name`, failing the first `failures_left` runs.
#[derive(Debug, Serialize, Deserialize)]
struct HelloJob {
    #[serde(flatten)]
    base: JobBase,
    name: String,
    failures_left: u32,
}

impl HelloJob {
    fn new(name: &str, failures: u32) -> Self {
        Self {
            base: JobBase::new(JobType::new(HELLO_JOB, 0)).with_id(format!("hello-{name}")),
            name: name.to_string(),
            failures_left: failures,
        }
    }
}

impl Default for HelloJob {
    fn default() -> Self {
        Self::new("", 0)
    }
}

#[async_trait]
impl Job for HelloJob {
    fn base(&self) -> &JobBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut JobBase {
        &mut self.base
    }

    async fn run(&mut self, _ctx: &JobContext) {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            self.base.add_error(Some(format!(
                "intentional failure (left={})",
                self.failures_left
            )));
            return;
        }
        println!("Hello, {}!", self.name);
        self.base.mark_complete();
    }

    fn export(&self) -> Result<Vec<u8>> {
        codec::encode(self.base.job_type.format, self)
    }

    fn import(&mut self, bytes: &[u8]) -> Result<()> {
        *self = codec::decode(bytes)?;
        Ok(())
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn shell(id: &str, command: &str, after: &[&str]) -> Box<dyn Job> {
    let mut job = ShellJob::new(command).with_id(id);
    if !after.is_empty() {
        job.set_dependency(Box::new(JobEdges::from_edges(after.iter().copied())));
    }
    Box::new(job)
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    // (A) 設定: 引数があれば JSON ファイルから読む
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::default(),
    };

    // (B) Registry に型を登録
    let registry = Registry::new();
    registry.register_job::<HelloJob>(HELLO_JOB, 0)?;
    registry.register_job::<ShellJob>(SHELL_JOB, 0)?;
    info!(types = ?registry.registered_types(), "registry ready");

    // (C) ジョブ投入: fetch -> build -> (test, lint)
    let queue = Arc::new(InMemoryQueue::from_config(&config.queue));
    queue.put(shell("fetch", "echo fetching", &[])).await?;
    queue.put(shell("build", "echo building", &["fetch"])).await?;
    queue.put(shell("test", "echo testing", &["build"])).await?;
    queue.put(shell("lint", "echo linting", &["build"])).await?;

    // export した bytes から Registry 経由で復元してから投入
    let bytes = HelloJob::new("skein", 2).export()?;
    let hello = registry.import(&bytes)?;
    let hello_id = hello.id().to_string();
    queue.put(hello).await?;

    // (D) Pool を起動して、close 後に drain されるまで待つ
    let pool = Pool::new(queue.clone(), config.pool.clone());
    pool.start()?;
    queue.close().await;
    pool.wait().await;

    // (E) 結果
    for id in ["fetch", "build", "test", "lint", hello_id.as_str()] {
        if let Some(st) = queue.status(id).await {
            println!(
                "{id}: state={:?} attempts={} errors={}",
                st.state,
                st.attempts,
                st.errors.len()
            );
        }
    }
    let stats = queue.stats().await;
    println!("stats: {}", serde_json::to_string(&stats)?);
    Ok(())
}
