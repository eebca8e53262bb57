//! skein-core
//!
//! Dependency-aware job execution.
//!
//! # Modules
//! - **job**: `Job` trait, `JobBase`, `JobType`/`Format`, `JobContext`, codec
//! - **dependency**: readiness policies (`AlwaysRun`, `LocalFile`, `JobEdges`) and the dependency graph
//! - **registry**: `(name, version)` → factory, for rebuilding jobs from bytes
//! - **queue**: `Queue` trait + in-memory implementation (priority, retry, draining)
//! - **pool**: concurrent workers over a queue
//! - **jobs**: ready-made job types (`ShellJob`)
//! - **config**: serde-backed engine configuration
//!
//! # Flow
//! put → the queue classifies pending jobs on every `next` (Ready / Blocked /
//! Passed / Unresolved) → workers run Ready jobs and `complete` them → the
//! next scan re-evaluates dependents → until the queue is closed and drained.

pub mod config;
pub mod dependency;
pub mod error;
pub mod job;
pub mod jobs;
pub mod observability;
pub mod pool;
pub mod queue;
pub mod registry;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{EngineConfig, PoolConfig, QueueConfig};
pub use dependency::{Dependency, DependencyState, DependencyType};
pub use error::{Result, SkeinError};
pub use job::{Format, Job, JobBase, JobContext, JobType};
pub use pool::Pool;
pub use queue::{Completion, Dispatch, InMemoryQueue, JobState, JobStatus, Queue, QueueStats, RetryPolicy};
pub use registry::Registry;
