// [[CASCADE]]/apps/kernel-server/src/dag.rs
// Purpose: Directed acyclic graph over node ids. Mutation is cycle-checked; surgery revalidates.
// Architecture: Core Data Structure
// Dependencies: std, thiserror

use std::collections::{HashMap, HashSet, VecDeque};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DagError {
    #[error("cycle detected in graph")]
    CycleDetected,
    #[error("unknown node: {0}")]
    InvalidNode(String),
    #[error("edge not found: {0} -> {1}")]
    EdgeNotFound(String, String),
}

/// Nodes are plain ids; edges an adjacency map source -> targets. No pointers,
/// so the whole value serializes, clones, and mutates without lifetime games.
/// Writers are serialized by the owning run; operations here are pure.
#[derive(Clone, Debug, Default)]
pub struct Dag {
    nodes: HashSet<String>,
    edges: HashMap<String, Vec<String>>,
}

impl Dag {
    pub fn new() -> Self {
        Dag::default()
    }

    /// Idempotent insertion.
    pub fn add_node(&mut self, node_id: impl Into<String>) {
        self.nodes.insert(node_id.into());
    }

    pub fn has_node(&self, node_id: &str) -> bool {
        self.nodes.contains(node_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Insert `from -> to`. Rejected when either endpoint is unknown or the
    /// edge would close a cycle (checked by walking from `to` back to `from`).
    pub fn add_edge(&mut self, from: &str, to: &str) -> Result<(), DagError> {
        if !self.nodes.contains(from) {
            return Err(DagError::InvalidNode(from.to_string()));
        }
        if !self.nodes.contains(to) {
            return Err(DagError::InvalidNode(to.to_string()));
        }
        if self.is_reachable(to, from) {
            return Err(DagError::CycleDetected);
        }

        self.edges
            .entry(from.to_string())
            .or_default()
            .push(to.to_string());
        Ok(())
    }

    pub fn remove_edge(&mut self, from: &str, to: &str) -> Result<(), DagError> {
        let targets = self
            .edges
            .get_mut(from)
            .ok_or_else(|| DagError::EdgeNotFound(from.to_string(), to.to_string()))?;
        let pos = targets
            .iter()
            .position(|t| t == to)
            .ok_or_else(|| DagError::EdgeNotFound(from.to_string(), to.to_string()))?;
        targets.remove(pos);
        Ok(())
    }

    /// Direct successors.
    pub fn get_children(&self, node_id: &str) -> Vec<String> {
        self.edges.get(node_id).cloned().unwrap_or_default()
    }

    /// Direct predecessors, derived by scanning the edge map. The adjacency
    /// map stays the single source of truth for structure.
    pub fn get_dependencies(&self, node_id: &str) -> Vec<String> {
        self.edges
            .iter()
            .filter(|(_, targets)| targets.iter().any(|t| t == node_id))
            .map(|(source, _)| source.clone())
            .collect()
    }

    // Iterative DFS: can `target` be reached from `start`?
    fn is_reachable(&self, start: &str, target: &str) -> bool {
        if start == target {
            return true;
        }
        let mut visited: HashSet<&str> = HashSet::new();
        let mut stack: Vec<&str> = vec![start];

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            if let Some(targets) = self.edges.get(current) {
                for next in targets {
                    if next == target {
                        return true;
                    }
                    stack.push(next);
                }
            }
        }
        false
    }

    /// Kahn's algorithm. An incomplete sort means the invariant was violated
    /// by direct mutation and the run must not proceed.
    pub fn topological_sort(&self) -> Result<Vec<String>, DagError> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();

        for targets in self.edges.values() {
            for target in targets {
                if let Some(degree) = in_degree.get_mut(target.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut queue: VecDeque<&str> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            order.push(node.to_string());

            if let Some(targets) = self.edges.get(node) {
                for target in targets {
                    if let Some(degree) = in_degree.get_mut(target.as_str()) {
                        *degree -= 1;
                        if *degree == 0 {
                            queue.push_back(target);
                        }
                    }
                }
            }
        }

        if order.len() != self.nodes.len() {
            return Err(DagError::CycleDetected);
        }
        Ok(order)
    }

    /// All node ids, for topology snapshots.
    pub fn export_nodes(&self) -> Vec<String> {
        self.nodes.iter().cloned().collect()
    }

    /// Flat edge list, for topology snapshots.
    pub fn export_edges(&self) -> Vec<(String, String)> {
        self.edges
            .iter()
            .flat_map(|(source, targets)| {
                targets
                    .iter()
                    .map(move |target| (source.clone(), target.clone()))
            })
            .collect()
    }
}
