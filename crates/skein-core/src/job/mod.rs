//! Job - the unit of work.
//!
//! # Layout
//! - **base**: `JobBase`, shared identity/dependency/error/completion state
//! - **job_type**: `JobType` + `Format` (registry key and wire encoding)
//! - **context**: `JobContext` handed to `run` (cancellation, deadline)
//! - **codec**: envelope-first encode/decode
//! - **time**: `TimeInfo`

pub mod base;
pub mod codec;
pub mod context;
pub mod job_type;
pub mod time;

pub use self::base::JobBase;
pub use self::context::JobContext;
pub use self::job_type::{Format, JobType};
pub use self::time::TimeInfo;

use std::fmt;

use async_trait::async_trait;

use crate::dependency::Dependency;
use crate::error::{Result, SkeinError};

/// A unit of work.
///
/// Implementors supply `base`/`base_mut`, `run`, `export` and `import`;
/// everything else forwards to the embedded `JobBase`.
///
/// `run` reports its outcome through the job itself (`add_error`,
/// `mark_complete`) rather than a return value, so the pool can treat every
/// variant the same way.
///
/// # Example
/// ```ignore
/// #[derive(Default, Serialize, Deserialize)]
/// struct Resize {
///     #[serde(flatten)]
///     base: JobBase,
///     width: u32,
/// }
///
/// #[async_trait]
/// impl Job for Resize {
///     fn base(&self) -> &JobBase { &self.base }
///     fn base_mut(&mut self) -> &mut JobBase { &mut self.base }
///     async fn run(&mut self, _ctx: &JobContext) { /* ... */ }
///     fn export(&self) -> Result<Vec<u8>> { codec::encode(self.base.job_type.format, self) }
///     fn import(&mut self, bytes: &[u8]) -> Result<()> { *self = codec::decode(bytes)?; Ok(()) }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn base(&self) -> &JobBase;

    fn base_mut(&mut self) -> &mut JobBase;

    /// Execute one attempt. Honor `ctx.cancelled()` for long work.
    async fn run(&mut self, ctx: &JobContext);

    /// Serialize identity, state and variant payload in `job_type().format`.
    fn export(&self) -> Result<Vec<u8>>;

    /// Replace every field with the snapshot in `bytes`.
    fn import(&mut self, bytes: &[u8]) -> Result<()>;

    fn id(&self) -> &str {
        self.base().id()
    }

    fn job_type(&self) -> &JobType {
        &self.base().job_type
    }

    fn dependency(&self) -> &dyn Dependency {
        self.base().dependency()
    }

    fn set_dependency(&mut self, dep: Box<dyn Dependency>) {
        self.base_mut().set_dependency(dep);
    }

    fn priority(&self) -> i32 {
        self.base().priority
    }

    fn time_info(&self) -> &TimeInfo {
        &self.base().time_info
    }

    fn mark_complete(&mut self) {
        self.base_mut().mark_complete();
    }

    fn completed(&self) -> bool {
        self.base().completed()
    }

    fn add_error<E: fmt::Display>(&mut self, err: Option<E>)
    where
        Self: Sized,
    {
        self.base_mut().add_error(err);
    }

    fn has_errors(&self) -> bool {
        self.base().has_errors()
    }

    fn error(&self) -> Option<SkeinError> {
        self.base().error()
    }
}

impl fmt::Debug for dyn Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id())
            .field("type", self.job_type())
            .field("complete", &self.completed())
            .finish()
    }
}
