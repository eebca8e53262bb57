//! Timing metadata carried with every job.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock bookkeeping for a job.
///
/// `created`, `started` and `ended` are observations. `wait_until` and
/// `max_time` are constraints: the queue will not dispatch the job before
/// `wait_until`, and the pool gives each attempt a deadline of `max_time`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInfo {
    pub created: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<DateTime<Utc>>,

    /// Per-attempt time limit in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_time_ms: Option<u64>,
}

impl TimeInfo {
    pub fn new() -> Self {
        Self {
            created: Utc::now(),
            started: None,
            ended: None,
            wait_until: None,
            max_time_ms: None,
        }
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.max_time_ms.map(Duration::from_millis)
    }

    pub fn set_max_time(&mut self, limit: Option<Duration>) {
        self.max_time_ms = limit.map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX));
    }

    /// True if `wait_until` is set and still in the future.
    pub fn is_waiting(&self, now: DateTime<Utc>) -> bool {
        self.wait_until.is_some_and(|at| at > now)
    }

    /// How long the last attempt ran, if it has both endpoints.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started, self.ended) {
            (Some(start), Some(end)) if end >= start => Some(end - start),
            _ => None,
        }
    }
}

impl Default for TimeInfo {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_until_in_future_is_waiting() {
        let mut t = TimeInfo::new();
        let now = Utc::now();
        assert!(!t.is_waiting(now));

        t.wait_until = Some(now + chrono::Duration::seconds(30));
        assert!(t.is_waiting(now));
        assert!(!t.is_waiting(now + chrono::Duration::seconds(31)));
    }

    #[test]
    fn max_time_roundtrips_through_millis() {
        let mut t = TimeInfo::new();
        t.set_max_time(Some(Duration::from_millis(1500)));
        assert_eq!(t.max_time_ms, Some(1500));
        assert_eq!(t.max_time(), Some(Duration::from_millis(1500)));

        t.set_max_time(None);
        assert_eq!(t.max_time(), None);
    }

    #[test]
    fn duration_needs_both_endpoints() {
        let mut t = TimeInfo::new();
        assert!(t.duration().is_none());

        let start = Utc::now();
        t.started = Some(start);
        t.ended = Some(start + chrono::Duration::milliseconds(250));
        assert_eq!(t.duration(), Some(chrono::Duration::milliseconds(250)));
    }
}
