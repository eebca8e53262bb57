//! Engine configuration.
//!
//! Every section deserializes with `#[serde(default)]`, so a config file only
//! names what it changes. Durations are written in milliseconds.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkeinError};
use crate::queue::RetryPolicy;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub pool: PoolConfig,
}

impl EngineConfig {
    pub fn from_json_str(s: &str) -> Result<Self> {
        serde_json::from_str(s).map_err(|e| SkeinError::Config(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| SkeinError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_json_str(&text)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub retry: RetryPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub workers: usize,

    /// First idle backoff; doubles up to `max_backoff`.
    #[serde(rename = "min_backoff_ms", with = "millis")]
    pub min_backoff: Duration,

    #[serde(rename = "max_backoff_ms", with = "millis")]
    pub max_backoff: Duration,

    /// Deadline placed on every attempt, on top of the job's own `max_time`.
    #[serde(rename = "job_timeout_ms", with = "opt_millis", skip_serializing_if = "Option::is_none")]
    pub job_timeout: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            min_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(500),
            job_timeout: None,
        }
    }
}

impl PoolConfig {
    /// Floor on the idle backoff, so a zero setting cannot spin a worker.
    pub const MIN_IDLE_BACKOFF: Duration = Duration::from_millis(1);

    /// `(min, max)` idle backoff as the workers use it: `min` at least
    /// `MIN_IDLE_BACKOFF`, `max` at least `min`.
    pub fn idle_backoff(&self) -> (Duration, Duration) {
        let min = self.min_backoff.max(Self::MIN_IDLE_BACKOFF);
        (min, self.max_backoff.max(min))
    }
}

pub(crate) mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

pub(crate) mod opt_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match d {
            Some(d) => super::millis::serialize(d, s),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Option::<u64>::deserialize(d).map(|ms| ms.map(Duration::from_millis))
    }
}
