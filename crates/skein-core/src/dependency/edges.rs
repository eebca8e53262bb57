//! Edge-based policy: a job waits for other jobs in the same queue.

use super::{Dependency, DependencyState, DependencyType, EdgeStatus, JOB_EDGES, Scope};

/// Ready once every edge job has completed successfully.
///
/// Evaluation order:
/// 1. owning job complete → `Passed`
/// 2. any edge not yet terminal (unknown, pending, dispatched) → `Blocked`
/// 3. every edge completed → `Ready`
/// 4. otherwise some edge failed for good → `Unresolved`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobEdges {
    edges: Vec<String>,
}

impl JobEdges {
    pub fn new() -> Self {
        Self { edges: Vec::new() }
    }

    /// Build from a list, dropping duplicates but keeping first-seen order.
    pub fn from_edges<I, S>(edges: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut dep = Self::new();
        for id in edges {
            dep.add_edge(id);
        }
        dep
    }

    /// Add an edge. Returns false if it was already present.
    pub fn add_edge(&mut self, id: impl Into<String>) -> bool {
        let id = id.into();
        if self.edges.contains(&id) {
            return false;
        }
        self.edges.push(id);
        true
    }
}

impl Dependency for JobEdges {
    fn dependency_type(&self) -> DependencyType {
        DependencyType::new(JOB_EDGES)
    }

    fn state(&self, scope: &Scope<'_>) -> DependencyState {
        if scope.owner_completed() {
            return DependencyState::Passed;
        }

        let mut all_completed = true;
        for id in &self.edges {
            match scope.edge_status(id) {
                EdgeStatus::Completed => {}
                EdgeStatus::Failed => all_completed = false,
                EdgeStatus::Unknown | EdgeStatus::Pending | EdgeStatus::Dispatched => {
                    return DependencyState::Blocked;
                }
            }
        }

        if all_completed {
            DependencyState::Ready
        } else {
            DependencyState::Unresolved
        }
    }

    fn edges(&self) -> &[String] {
        &self.edges
    }

    fn clone_box(&self) -> Box<dyn Dependency> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rstest::rstest;

    use super::*;

    fn scope_of(entries: &[(&str, EdgeStatus)]) -> HashMap<String, EdgeStatus> {
        entries
            .iter()
            .map(|(id, status)| (id.to_string(), *status))
            .collect()
    }

    #[test]
    fn add_edge_dedupes_in_order() {
        let mut dep = JobEdges::new();
        assert!(dep.add_edge("b"));
        assert!(dep.add_edge("a"));
        assert!(!dep.add_edge("b"));
        assert_eq!(dep.edges(), ["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn no_edges_is_ready() {
        let dep = JobEdges::new();
        assert_eq!(dep.state(&Scope::detached(false)), DependencyState::Ready);
    }

    #[rstest]
    #[case::unknown(EdgeStatus::Unknown, DependencyState::Blocked)]
    #[case::pending(EdgeStatus::Pending, DependencyState::Blocked)]
    #[case::dispatched(EdgeStatus::Dispatched, DependencyState::Blocked)]
    #[case::completed(EdgeStatus::Completed, DependencyState::Ready)]
    #[case::failed(EdgeStatus::Failed, DependencyState::Unresolved)]
    fn single_edge(#[case] edge: EdgeStatus, #[case] expected: DependencyState) {
        let dep = JobEdges::from_edges(["a"]);
        let map = scope_of(&[("a", edge)]);
        assert_eq!(dep.state(&Scope::new(false, &map)), expected);
    }

    #[test]
    fn blocked_wins_over_failed_while_edges_are_in_flight() {
        let dep = JobEdges::from_edges(["a", "b"]);
        let map = scope_of(&[("a", EdgeStatus::Failed), ("b", EdgeStatus::Pending)]);
        assert_eq!(dep.state(&Scope::new(false, &map)), DependencyState::Blocked);
    }

    #[test]
    fn completed_owner_passes() {
        let dep = JobEdges::from_edges(["a"]);
        let map = scope_of(&[("a", EdgeStatus::Pending)]);
        assert_eq!(dep.state(&Scope::new(true, &map)), DependencyState::Passed);
    }
}
