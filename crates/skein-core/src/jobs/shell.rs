//! ShellJob - run a command line as a job.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::error::Result;
use crate::job::{Job, JobBase, JobContext, JobType, codec};

/// Registry name of [`ShellJob`].
pub const SHELL_JOB: &str = "shell";

/// Runs `command` through the platform shell.
///
/// A non-zero exit status, a spawn failure or cancellation each record one
/// error. Combined stdout/stderr is kept in `output`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellJob {
    #[serde(flatten)]
    base: JobBase,

    pub command: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default)]
    pub output: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl ShellJob {
    pub fn kind() -> JobType {
        JobType::new(SHELL_JOB, 0)
    }

    pub fn new(command: impl Into<String>) -> Self {
        Self {
            base: JobBase::new(Self::kind()),
            command: command.into(),
            working_dir: None,
            env: BTreeMap::new(),
            output: String::new(),
            exit_code: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.base.set_id(id);
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c");
            c
        };
        cmd.arg(&self.command)
            .envs(&self.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl Default for ShellJob {
    fn default() -> Self {
        Self::new("")
    }
}

#[async_trait]
impl Job for ShellJob {
    fn base(&self) -> &JobBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut JobBase {
        &mut self.base
    }

    async fn run(&mut self, ctx: &JobContext) {
        self.base.time_info.started = Some(Utc::now());
        debug!(job_id = %self.base.id(), command = %self.command, "spawning");

        let child = match self.build_command().spawn() {
            Ok(child) => child,
            Err(err) => {
                self.base.add_error(Some(format!("spawn `{}`: {err}", self.command)));
                self.base.time_info.ended = Some(Utc::now());
                return;
            }
        };

        // dropping the wait future kills the child (kill_on_drop)
        let result = tokio::select! {
            out = child.wait_with_output() => Some(out),
            _ = ctx.cancelled() => None,
        };

        match result {
            None => self.base.add_error(Some(format!("`{}` cancelled", self.command))),
            Some(Err(err)) => self.base.add_error(Some(format!("wait `{}`: {err}", self.command))),
            Some(Ok(out)) => {
                self.output = String::from_utf8_lossy(&out.stdout).into_owned();
                self.output.push_str(&String::from_utf8_lossy(&out.stderr));
                self.exit_code = out.status.code();
                if out.status.success() {
                    self.base.mark_complete();
                } else {
                    self.base
                        .add_error(Some(format!("`{}` exited with {}", self.command, out.status)));
                }
            }
        }
        self.base.time_info.ended = Some(Utc::now());
    }

    fn export(&self) -> Result<Vec<u8>> {
        codec::encode(self.base.job_type.format, self)
    }

    fn import(&mut self, bytes: &[u8]) -> Result<()> {
        *self = codec::decode(bytes)?;
        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dependency::{JOB_EDGES, JobEdges};

    #[tokio::test]
    async fn successful_command_completes_with_output() {
        let mut job = ShellJob::new("echo hello").with_id("echo");
        job.run(&JobContext::background()).await;

        assert!(job.completed());
        assert!(!job.has_errors());
        assert_eq!(job.output.trim(), "hello");
        assert_eq!(job.exit_code, Some(0));
        assert!(job.time_info().duration().is_some());
    }

    #[tokio::test]
    async fn failing_command_records_one_error() {
        let mut job = ShellJob::new("exit 3");
        job.run(&JobContext::background()).await;

        assert!(!job.completed());
        assert_eq!(job.base().errors.len(), 1);
        assert_eq!(job.exit_code, Some(3));
    }

    #[tokio::test]
    async fn env_and_working_dir_are_applied() {
        let dir = std::env::temp_dir();
        let mut job = ShellJob::new("echo $GREETING; pwd")
            .with_env("GREETING", "hi")
            .with_working_dir(&dir);
        job.run(&JobContext::background()).await;

        let mut lines = job.output.lines();
        assert_eq!(lines.next(), Some("hi"));
        assert!(lines.next().is_some());
    }

    #[tokio::test]
    async fn cancellation_stops_the_command() {
        let mut job = ShellJob::new("sleep 30");
        let ctx = JobContext::background().with_timeout(Duration::from_millis(50));

        tokio::time::timeout(Duration::from_secs(5), job.run(&ctx))
            .await
            .unwrap();

        assert!(!job.completed());
        assert!(job.error().unwrap().to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn export_import_keeps_payload_and_state() {
        let mut job = ShellJob::new("true").with_id("s1").with_env("K", "V");
        job.set_dependency(Box::new(JobEdges::from_edges(["build"])));
        job.base_mut().add_error(Some("earlier"));
        let bytes = job.export().unwrap();

        let mut other = ShellJob::default();
        other.import(&bytes).unwrap();
        assert_eq!(other.id(), "s1");
        assert_eq!(other.command, "true");
        assert_eq!(other.env.get("K").map(String::as_str), Some("V"));
        assert_eq!(other.base().errors, vec!["earlier".to_string()]);
        assert_eq!(other.dependency().dependency_type().name, JOB_EDGES);
        assert_eq!(other.job_type(), &ShellJob::kind());
    }
}
