//! JobBase - the state every job variant shares.
//!
//! Concrete jobs embed a `JobBase` (usually `#[serde(flatten)]`) and hand it
//! out through `Job::base()` / `Job::base_mut()`; the rest of the `Job`
//! contract is provided on top of that.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::codec;
use super::job_type::JobType;
use super::time::TimeInfo;
use crate::dependency::{self, AlwaysRun, Dependency, DependencyRecord};
use crate::error::{Result, SkeinError};

/// Identity, dependency and execution state of a job.
///
/// Invariants:
/// - `is_complete` only ever goes false -> true.
/// - `errors` only grows; `add_error(None)` leaves it untouched.
#[derive(Debug, Clone)]
pub struct JobBase {
    pub id: String,
    pub job_type: JobType,
    pub priority: i32,
    pub is_complete: bool,
    pub errors: Vec<String>,
    pub time_info: TimeInfo,
    dep: Box<dyn Dependency>,
}

impl JobBase {
    /// New base with a generated id (`<name>-<ulid>`) and an `AlwaysRun` dependency.
    pub fn new(job_type: JobType) -> Self {
        let id = if job_type.name.is_empty() {
            ulid::Ulid::new().to_string()
        } else {
            format!("{}-{}", job_type.name, ulid::Ulid::new())
        };
        Self {
            id,
            job_type,
            priority: 0,
            is_complete: false,
            errors: Vec::new(),
            time_info: TimeInfo::new(),
            dep: Box::new(AlwaysRun::new()),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_dependency(mut self, dep: Box<dyn Dependency>) -> Self {
        self.dep = dep;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn dependency(&self) -> &dyn Dependency {
        self.dep.as_ref()
    }

    pub fn set_dependency(&mut self, dep: Box<dyn Dependency>) {
        self.dep = dep;
    }

    pub fn mark_complete(&mut self) {
        self.is_complete = true;
    }

    pub fn completed(&self) -> bool {
        self.is_complete
    }

    /// Record a failure. `None` is a no-op.
    ///
    /// Line breaks inside the message are escaped so that each recorded
    /// error stays on exactly one line of `error()`.
    pub fn add_error<E: fmt::Display>(&mut self, err: Option<E>) {
        if let Some(err) = err {
            self.errors.push(single_line(err.to_string()));
        }
    }

    /// Record the error side of `result`, pass the value through.
    pub fn record<T, E: fmt::Display>(&mut self, result: std::result::Result<T, E>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.add_error(Some(err));
                None
            }
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// All recorded errors as one, one line per error, or `None`.
    pub fn error(&self) -> Option<SkeinError> {
        if self.errors.is_empty() {
            None
        } else {
            Some(SkeinError::Execution(self.errors.join("\n")))
        }
    }

    pub fn export(&self) -> Result<Vec<u8>> {
        codec::encode(self.job_type.format, self)
    }

    /// Overwrite every field with the decoded snapshot.
    pub fn import(&mut self, bytes: &[u8]) -> Result<()> {
        *self = codec::decode(bytes)?;
        Ok(())
    }
}

impl Default for JobBase {
    fn default() -> Self {
        Self::new(JobType::default())
    }
}

/// Wire shape of `JobBase`.
#[derive(Serialize, Deserialize)]
struct JobBaseWire {
    id: String,
    #[serde(rename = "type")]
    job_type: JobType,
    dependency: DependencyRecord,
    #[serde(default)]
    priority: i32,
    #[serde(default)]
    complete: bool,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    time_info: TimeInfo,
}

impl Serialize for JobBase {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        JobBaseWire {
            id: self.id.clone(),
            job_type: self.job_type.clone(),
            dependency: DependencyRecord::capture(self.dep.as_ref(), self.is_complete),
            priority: self.priority,
            complete: self.is_complete,
            errors: self.errors.clone(),
            time_info: self.time_info.clone(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for JobBase {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let wire = JobBaseWire::deserialize(deserializer)?;
        let dep = dependency::from_record(wire.dependency).map_err(serde::de::Error::custom)?;
        Ok(Self {
            id: wire.id,
            job_type: wire.job_type,
            priority: wire.priority,
            is_complete: wire.complete,
            errors: wire.errors,
            time_info: wire.time_info,
            dep,
        })
    }
}

fn single_line(msg: String) -> String {
    if msg.contains(['\n', '\r']) {
        msg.replace("\r\n", "\\n").replace('\n', "\\n").replace('\r', "\\r")
    } else {
        msg
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;
    use crate::dependency::{ALWAYS_RUN, JOB_EDGES, JobEdges, LOCAL_FILE_RELATIONSHIP, LocalFile};
    use crate::job::Format;

    fn base() -> JobBase {
        JobBase::new(JobType::new("base", 0))
    }

    #[test]
    fn initial_values() {
        let b = base();
        assert!(!b.is_complete);
        assert!(b.errors.is_empty());
        assert_eq!(b.dependency().dependency_type().name, ALWAYS_RUN);
        assert!(b.id().starts_with("base-"));
    }

    #[rstest]
    #[case(1)]
    #[case(10)]
    #[case(100)]
    fn add_error_none_does_not_change_error_state(#[case] n: usize) {
        let mut b = base();
        for _ in 0..n {
            b.add_error(None::<&str>);
            assert!(b.error().is_none());
            assert!(b.errors.is_empty());
            assert!(!b.has_errors());
        }
    }

    #[test]
    fn add_errors_persist_in_insertion_order() {
        let mut b = base();
        for i in 1..=100 {
            b.add_error(Some("foo"));
            let err = b.error().unwrap();
            assert_eq!(b.errors.len(), i);
            assert!(b.has_errors());
            assert_eq!(err.to_string().split('\n').count(), i);
        }

        let mut b = base();
        b.add_error(Some("first"));
        b.add_error(Some(SkeinError::QueueClosed));
        assert_eq!(b.error().unwrap().to_string(), "first\nqueue is closed");
    }

    #[rstest]
    #[case("line1\nline2", "line1\\nline2")]
    #[case("crlf\r\nend", "crlf\\nend")]
    #[case("bare\rcr", "bare\\rcr")]
    #[case("\n", "\\n")]
    fn multi_line_errors_stay_on_one_line(#[case] msg: &str, #[case] stored: &str) {
        let mut b = base();
        b.add_error(Some(msg));
        b.add_error(Some("after"));
        assert_eq!(b.errors[0], stored);
        let joined = b.error().unwrap().to_string();
        assert_eq!(joined.lines().count(), b.errors.len());
        assert_eq!(joined, format!("{stored}\nafter"));
    }

    #[test]
    fn record_passes_values_and_keeps_errors() {
        let mut b = base();
        assert_eq!(b.record::<_, String>(Ok(5)), Some(5));
        assert_eq!(b.record::<i32, _>(Err("boom")), None);
        assert_eq!(b.errors, vec!["boom".to_string()]);
    }

    #[test]
    fn id_is_accessor_for_id_field() {
        let mut b = base();
        assert_eq!(b.id, b.id());
        b.id = "foo".to_string();
        assert_eq!("foo", b.id());
        b.set_id("bar");
        assert_eq!(b.id, b.id());
        assert_eq!("bar", b.id());
    }

    #[test]
    fn dependency_accessor_returns_last_set() {
        let mut b = base();
        b.set_dependency(Box::new(AlwaysRun::new()));
        assert_eq!(b.dependency().dependency_type().name, ALWAYS_RUN);

        b.set_dependency(Box::new(LocalFile::default()));
        assert_ne!(b.dependency().dependency_type().name, ALWAYS_RUN);
        assert_eq!(
            b.dependency().dependency_type().name,
            LOCAL_FILE_RELATIONSHIP
        );

        b.set_dependency(Box::new(JobEdges::from_edges(["x"])));
        assert_eq!(b.dependency().dependency_type().name, JOB_EDGES);
        assert_eq!(b.dependency().edges(), ["x".to_string()]);
    }

    #[test]
    fn mark_complete_is_idempotent() {
        let mut b = base();
        assert!(!b.is_complete);
        assert!(!b.completed());

        b.mark_complete();
        assert!(b.is_complete);
        assert!(b.completed());

        b.mark_complete();
        assert!(b.completed());
    }

    #[test]
    fn import_restores_exported_snapshot() {
        let mut b = base();
        b.job_type = JobType {
            name: String::new(),
            format: Format::Json,
            version: 42,
        };
        assert_eq!(b.job_type.version, 42);

        let out = b.export().unwrap();
        assert!(!out.is_empty());

        b.job_type.version = 21;
        assert_eq!(b.job_type.version, 21);

        b.import(&out).unwrap();
        assert_eq!(b.job_type.version, 42);
    }

    #[test]
    fn import_overwrites_all_state() {
        let mut b = base().with_priority(3);
        b.set_dependency(Box::new(JobEdges::from_edges(["up"])));
        b.add_error(Some("earlier"));
        let snapshot = b.export().unwrap();

        b.mark_complete();
        b.add_error(Some("later"));
        b.set_id("renamed");
        b.priority = 9;
        b.set_dependency(Box::new(AlwaysRun::new()));

        b.import(&snapshot).unwrap();
        assert!(!b.completed());
        assert_eq!(b.errors, vec!["earlier".to_string()]);
        assert_ne!(b.id(), "renamed");
        assert_eq!(b.priority, 3);
        assert_eq!(b.dependency().dependency_type().name, JOB_EDGES);
        assert_eq!(b.dependency().edges(), ["up".to_string()]);
    }

    #[test]
    fn wire_shape_has_required_fields() {
        let mut b = base().with_id("j1");
        b.set_dependency(Box::new(JobEdges::from_edges(["a"])));
        b.add_error(Some("bad"));
        let v: serde_json::Value = serde_json::from_slice(&b.export().unwrap()).unwrap();

        assert_eq!(v["id"], "j1");
        assert_eq!(v["type"]["name"], "base");
        assert_eq!(v["type"]["format"], "json");
        assert_eq!(v["dependency"]["type"]["name"], JOB_EDGES);
        assert_eq!(v["dependency"]["edges"][0], "a");
        assert_eq!(v["dependency"]["state"], "blocked");
        assert_eq!(v["complete"], false);
        assert_eq!(v["errors"][0], "bad");
    }

    #[test]
    fn import_rejects_garbage_and_leaves_receiver_alone() {
        let mut b = base().with_id("keep");
        assert!(matches!(
            b.import(b"\x00\x01"),
            Err(SkeinError::Serialization(_))
        ));
        assert_eq!(b.id(), "keep");
    }

    proptest! {
        #[test]
        fn n_errors_yield_n_lines(msgs in proptest::collection::vec("[a-z \r\n]{1,12}", 1..40)) {
            let mut b = base();
            for m in &msgs {
                b.add_error(Some(m));
                b.add_error(None::<String>);
            }
            prop_assert_eq!(b.errors.len(), msgs.len());
            prop_assert!(b.has_errors());
            let joined = b.error().unwrap().to_string();
            prop_assert_eq!(joined.split('\n').count(), msgs.len());
            prop_assert!(!joined.contains('\r'));
        }
    }
}
