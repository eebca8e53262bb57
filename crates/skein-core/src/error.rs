use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = SkeinError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SkeinError {
    #[error("duplicate job id={0}")]
    DuplicateId(String),

    #[error("duplicate registration for job type {name}@v{version}")]
    DuplicateRegistration { name: String, version: u32 },

    #[error("unknown job type {name}@v{version}")]
    UnknownJobType { name: String, version: u32 },

    #[error("unknown dependency type {0}")]
    UnknownDependencyType(String),

    #[error("serialization: {0}")]
    Serialization(String),

    /// Job-level failure. Displays the bare message so that combined errors
    /// keep one line per recorded failure.
    #[error("{0}")]
    Execution(String),

    #[error("job {id} failed after {attempts} attempt(s): {last_error}")]
    RetryExhausted {
        id: String,
        attempts: u32,
        last_error: String,
    },

    #[error("queue is closed")]
    QueueClosed,

    #[error("unknown job id={0}")]
    UnknownJob(String),

    #[error("job id={0} is not dispatched")]
    NotDispatched(String),

    #[error("dependency cycle: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("pool already started")]
    PoolAlreadyStarted,

    #[error("config: {0}")]
    Config(String),
}

impl From<serde_json::Error> for SkeinError {
    fn from(err: serde_json::Error) -> Self {
        SkeinError::Serialization(err.to_string())
    }
}

impl SkeinError {
    pub fn execution(message: impl Into<String>) -> Self {
        SkeinError::Execution(message.into())
    }
}
