//! Dependency policies: decide whether a job may run.
//!
//! A policy never looks anything up on its own. The queue hands it a `Scope`
//! describing what it currently knows (is the owning job complete? where is
//! each edge job?) and the policy answers with a `DependencyState`. Same scope
//! in, same state out.

mod always;
mod edges;
mod graph;
mod local_file;

pub use always::AlwaysRun;
pub use edges::JobEdges;
pub use graph::DependencyGraph;
pub use local_file::LocalFile;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SkeinError};

/// Type name of [`AlwaysRun`].
pub const ALWAYS_RUN: &str = "always";
/// Type name of [`LocalFile`].
pub const LOCAL_FILE_RELATIONSHIP: &str = "local-file";
/// Type name of [`JobEdges`].
pub const JOB_EDGES: &str = "job-edges";

/// Evaluation result of a dependency policy.
///
/// - `Ready`: may be dispatched now.
/// - `Blocked`: waiting on something that may still change.
/// - `Passed`: nothing left to do; the queue completes the job without running it.
/// - `Unresolved`: can never become ready (an upstream job failed for good).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyState {
    Unresolved,
    Ready,
    Blocked,
    Passed,
}

impl fmt::Display for DependencyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyState::Unresolved => "unresolved",
            DependencyState::Ready => "ready",
            DependencyState::Blocked => "blocked",
            DependencyState::Passed => "passed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyType {
    pub name: String,
    #[serde(default)]
    pub version: u32,
}

impl DependencyType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: 0,
        }
    }
}

/// Where the queue last saw an edge job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeStatus {
    /// Not tracked (yet).
    Unknown,
    Pending,
    Dispatched,
    /// Finished successfully.
    Completed,
    /// Failed permanently.
    Failed,
}

/// Read-only view of edge job status.
pub trait EdgeLookup {
    fn edge_status(&self, id: &str) -> EdgeStatus;
}

impl EdgeLookup for HashMap<String, EdgeStatus> {
    fn edge_status(&self, id: &str) -> EdgeStatus {
        self.get(id).copied().unwrap_or(EdgeStatus::Unknown)
    }
}

struct NoEdges;

impl EdgeLookup for NoEdges {
    fn edge_status(&self, _id: &str) -> EdgeStatus {
        EdgeStatus::Unknown
    }
}

/// Everything a policy may consult during evaluation.
pub struct Scope<'a> {
    owner_completed: bool,
    lookup: &'a dyn EdgeLookup,
}

impl<'a> Scope<'a> {
    pub fn new(owner_completed: bool, lookup: &'a dyn EdgeLookup) -> Self {
        Self {
            owner_completed,
            lookup,
        }
    }

    /// Scope with no queue behind it: every edge is `Unknown`.
    pub fn detached(owner_completed: bool) -> Scope<'static> {
        Scope {
            owner_completed,
            lookup: &NoEdges,
        }
    }

    pub fn owner_completed(&self) -> bool {
        self.owner_completed
    }

    pub fn edge_status(&self, id: &str) -> EdgeStatus {
        self.lookup.edge_status(id)
    }
}

/// Readiness policy attached to every job.
///
/// Implementations must be cheap and side-effect free: the queue calls
/// `state` on every scan, possibly from several workers in turn.
pub trait Dependency: Send + Sync + fmt::Debug {
    fn dependency_type(&self) -> DependencyType;

    fn state(&self, scope: &Scope<'_>) -> DependencyState;

    /// Job IDs this policy is conditioned on.
    fn edges(&self) -> &[String] {
        &[]
    }

    /// Policy-specific fields for the wire form.
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    fn clone_box(&self) -> Box<dyn Dependency>;
}

impl Clone for Box<dyn Dependency> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Wire form of a dependency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyRecord {
    #[serde(rename = "type")]
    pub dependency_type: DependencyType,

    #[serde(default)]
    pub edges: Vec<String>,

    pub state: DependencyState,

    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub config: serde_json::Value,
}

impl DependencyRecord {
    /// Capture `dep`. `state` is evaluated without a queue, so it only knows
    /// whether the owning job is complete.
    pub fn capture(dep: &dyn Dependency, owner_completed: bool) -> Self {
        Self {
            dependency_type: dep.dependency_type(),
            edges: dep.edges().to_vec(),
            state: dep.state(&Scope::detached(owner_completed)),
            config: dep.config(),
        }
    }
}

/// Rebuild one of the built-in policies from its wire form.
pub fn from_record(record: DependencyRecord) -> Result<Box<dyn Dependency>> {
    match record.dependency_type.name.as_str() {
        ALWAYS_RUN => Ok(Box::new(AlwaysRun::new())),
        JOB_EDGES => Ok(Box::new(JobEdges::from_edges(record.edges))),
        LOCAL_FILE_RELATIONSHIP => {
            let dep: LocalFile = serde_json::from_value(record.config)?;
            Ok(Box::new(dep))
        }
        other => Err(SkeinError::UnknownDependencyType(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_snake_case() {
        let s = serde_json::to_string(&DependencyState::Passed).unwrap();
        assert_eq!(s, "\"passed\"");
    }

    #[test]
    fn edges_record_roundtrip() {
        let mut dep = JobEdges::new();
        dep.add_edge("a");
        dep.add_edge("b");

        let record = DependencyRecord::capture(&dep, false);
        assert_eq!(record.state, DependencyState::Blocked);

        let json = serde_json::to_string(&record).unwrap();
        let back: DependencyRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);

        let rebuilt = from_record(back).unwrap();
        assert_eq!(rebuilt.dependency_type().name, JOB_EDGES);
        assert_eq!(rebuilt.edges(), ["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn local_file_record_roundtrip() {
        let dep = LocalFile::new(vec!["out.bin".into()], vec!["in.txt".into()]);
        let record = DependencyRecord::capture(&dep, false);
        let rebuilt = from_record(record.clone()).unwrap();
        assert_eq!(rebuilt.config(), record.config);
    }

    #[test]
    fn unknown_type_is_rejected() {
        let record = DependencyRecord {
            dependency_type: DependencyType::new("mystery"),
            edges: vec![],
            state: DependencyState::Ready,
            config: serde_json::Value::Null,
        };
        let err = from_record(record).unwrap_err();
        assert!(matches!(err, SkeinError::UnknownDependencyType(name) if name == "mystery"));
    }

    #[test]
    fn map_lookup_defaults_to_unknown() {
        let mut map = HashMap::new();
        map.insert("a".to_string(), EdgeStatus::Completed);
        assert_eq!(map.edge_status("a"), EdgeStatus::Completed);
        assert_eq!(map.edge_status("b"), EdgeStatus::Unknown);
    }
}
