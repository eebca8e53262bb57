//! File-relationship policy: run only when targets are missing or stale.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use super::{Dependency, DependencyState, DependencyType, LOCAL_FILE_RELATIONSHIP, Scope};

/// Make-style relationship between source files and target files.
///
/// - owning job complete → `Passed`
/// - a source does not exist → `Blocked` (something upstream has to produce it)
/// - no targets, or a target does not exist → `Ready`
/// - a source is newer than the oldest target → `Ready`
/// - otherwise the targets are up to date → `Passed`
///
/// Only reads file metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalFile {
    #[serde(default)]
    pub targets: Vec<PathBuf>,
    #[serde(default)]
    pub sources: Vec<PathBuf>,
}

impl LocalFile {
    pub fn new(targets: Vec<PathBuf>, sources: Vec<PathBuf>) -> Self {
        Self { targets, sources }
    }
}

fn modified(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

impl Dependency for LocalFile {
    fn dependency_type(&self) -> DependencyType {
        DependencyType::new(LOCAL_FILE_RELATIONSHIP)
    }

    fn state(&self, scope: &Scope<'_>) -> DependencyState {
        if scope.owner_completed() {
            return DependencyState::Passed;
        }

        let mut newest_source: Option<SystemTime> = None;
        for source in &self.sources {
            let Some(mtime) = modified(source) else {
                return DependencyState::Blocked;
            };
            newest_source = Some(newest_source.map_or(mtime, |n| n.max(mtime)));
        }

        if self.targets.is_empty() {
            return DependencyState::Ready;
        }

        let mut oldest_target: Option<SystemTime> = None;
        for target in &self.targets {
            let Some(mtime) = modified(target) else {
                return DependencyState::Ready;
            };
            oldest_target = Some(oldest_target.map_or(mtime, |o| o.min(mtime)));
        }

        match (newest_source, oldest_target) {
            (Some(source), Some(target)) if source > target => DependencyState::Ready,
            _ => DependencyState::Passed,
        }
    }

    fn config(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn clone_box(&self) -> Box<dyn Dependency> {
        Box::new(self.clone())
    }
}
