//! Dependency graph over job IDs.
//!
//! Forward edges only: job -> jobs it depends on (waits for).
//!
//! The queue uses this to reject a `put` whose edges would close a cycle.
//! Readiness itself is decided by each job's `Dependency`, not here. Edges of
//! a job are dropped once it reaches a terminal state, so the graph only
//! holds jobs that may still run.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

/// Dependency graph for tracking job dependencies.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    /// Forward edges: job -> jobs it depends on (waits for)
    edges: HashMap<String, HashSet<String>>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    /// On the current DFS path.
    Gray,
    /// Fully explored, known cycle-free.
    Black,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a dependency: `job` depends on `depends_on`.
    ///
    /// Example: add_dependency("b", "a") means "b waits for a".
    pub fn add_dependency(&mut self, job: &str, depends_on: &str) {
        self.edges
            .entry(job.to_string())
            .or_default()
            .insert(depends_on.to_string());
    }

    /// Remove a dependency: `job` no longer depends on `depends_on`.
    pub fn remove_dependency(&mut self, job: &str, depends_on: &str) {
        if let Entry::Occupied(mut e) = self.edges.entry(job.to_string()) {
            e.get_mut().remove(depends_on);
            if e.get().is_empty() {
                e.remove_entry();
            }
        }
    }

    /// Forget every edge out of `job`.
    pub fn remove_job(&mut self, job: &str) {
        self.edges.remove(job);
    }

    /// Direct dependencies of `job`, sorted for stable output.
    pub fn dependencies(&self, job: &str) -> Vec<String> {
        let mut out: Vec<String> = self
            .edges
            .get(job)
            .map(|deps| deps.iter().cloned().collect())
            .unwrap_or_default();
        out.sort();
        out
    }

    /// Number of jobs with at least one outgoing edge.
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Find a cycle reachable from `start`.
    ///
    /// Returns the cycle as a path whose first and last element are the same
    /// job, or `None`. O(V + E).
    pub fn detect_cycle_from(&self, start: &str) -> Option<Vec<String>> {
        let mut colors = HashMap::new();
        let mut path = Vec::new();
        self.dfs_cycle(start, &mut colors, &mut path)
    }

    fn dfs_cycle(
        &self,
        node: &str,
        colors: &mut HashMap<String, Color>,
        path: &mut Vec<String>,
    ) -> Option<Vec<String>> {
        colors.insert(node.to_string(), Color::Gray);
        path.push(node.to_string());

        for dep in self.dependencies(node) {
            match colors.get(&dep) {
                Some(Color::Gray) => {
                    let from = path.iter().position(|p| *p == dep).unwrap_or(0);
                    let mut cycle = path[from..].to_vec();
                    cycle.push(dep);
                    return Some(cycle);
                }
                Some(Color::Black) => {}
                None => {
                    if let Some(cycle) = self.dfs_cycle(&dep, colors, path) {
                        return Some(cycle);
                    }
                }
            }
        }

        colors.insert(node.to_string(), Color::Black);
        path.pop();
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_graph_is_empty() {
        let graph = DependencyGraph::new();
        assert!(graph.is_empty());
        assert!(graph.dependencies("a").is_empty());
        assert!(graph.detect_cycle_from("a").is_none());
    }

    #[test]
    fn add_dependency_records_forward_edge() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("b", "a");

        assert_eq!(graph.dependencies("b"), vec!["a".to_string()]);
        assert!(graph.dependencies("a").is_empty());
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn remove_dependency_drops_empty_entries() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("b", "a");
        graph.remove_dependency("b", "a");

        assert!(graph.dependencies("b").is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn remove_job_forgets_all_its_edges() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("c", "a");
        graph.add_dependency("c", "b");
        graph.add_dependency("d", "c");
        graph.remove_job("c");

        assert!(graph.dependencies("c").is_empty());
        assert_eq!(graph.dependencies("d"), vec!["c".to_string()]);
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn detect_simple_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "b");
        graph.add_dependency("b", "a");

        let cycle = graph.detect_cycle_from("a").unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert_eq!(cycle.len(), 3);
    }

    #[test]
    fn detect_self_dependency() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("a", "a");
        assert_eq!(
            graph.detect_cycle_from("a"),
            Some(vec!["a".to_string(), "a".to_string()])
        );
    }

    #[test]
    fn detect_longer_cycle_from_entry_point() {
        let mut graph = DependencyGraph::new();
        // a <- b <- c <- d <- b
        graph.add_dependency("b", "a");
        graph.add_dependency("c", "b");
        graph.add_dependency("d", "c");
        graph.add_dependency("b", "d");

        let cycle = graph.detect_cycle_from("d").unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&"b".to_string()));
        assert!(!cycle.contains(&"a".to_string()));
    }

    #[test]
    fn diamond_is_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        graph.add_dependency("b", "a");
        graph.add_dependency("c", "b");
        graph.add_dependency("c", "a");
        assert!(graph.detect_cycle_from("c").is_none());
    }

    #[test]
    fn cross_edges_are_not_a_cycle() {
        let mut graph = DependencyGraph::new();
        //     a
        //    / \
        //   b   c
        //   |\ /|
        //   | X |
        //   |/ \|
        //   d   e
        graph.add_dependency("b", "a");
        graph.add_dependency("c", "a");
        graph.add_dependency("d", "b");
        graph.add_dependency("e", "b");
        graph.add_dependency("d", "c");
        graph.add_dependency("e", "c");
        for start in ["d", "e"] {
            assert!(graph.detect_cycle_from(start).is_none());
        }
    }
}
