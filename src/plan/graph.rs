//! ExecutionPlanGraph: a validated, immutable chain DAG

use super::node::{ExecutionNode, NodeId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while building or validating a plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("dependency cycle between nodes: {}", join_ids(.nodes))]
    Cycle { nodes: Vec<NodeId> },

    #[error("node '{node}' depends on unknown node '{missing}'")]
    UnknownNode { node: NodeId, missing: NodeId },

    #[error("node '{0}' is defined more than once")]
    DuplicateNode(NodeId),

    #[error("node '{0}' has an empty engine name")]
    EmptyEngine(NodeId),

    #[error("chain '{0}' contains no execution nodes")]
    EmptyPlan(String),

    #[error("invalid chain definition '{line}': {reason}")]
    Syntax { line: String, reason: String },
}

fn join_ids(ids: &[NodeId]) -> String {
    ids.iter().map(NodeId::as_str).collect::<Vec<_>>().join(", ")
}

/// A named chain: nodes keyed by id plus the reverse (dependents) index.
///
/// Constructed only through [`ExecutionPlanGraph::new`], which validates;
/// after that the graph is read-only and can be shared across runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionPlanGraph {
    name: String,
    nodes: BTreeMap<NodeId, ExecutionNode>,
    #[serde(skip)]
    dependents: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl ExecutionPlanGraph {
    /// Build and validate a plan.
    pub fn new(name: impl Into<String>, nodes: Vec<ExecutionNode>) -> Result<Self, PlanError> {
        let name = name.into();
        let mut by_id = BTreeMap::new();
        for node in nodes {
            if node.engine.trim().is_empty() {
                return Err(PlanError::EmptyEngine(node.id));
            }
            if by_id.contains_key(&node.id) {
                return Err(PlanError::DuplicateNode(node.id));
            }
            by_id.insert(node.id.clone(), node);
        }

        let mut dependents: BTreeMap<NodeId, BTreeSet<NodeId>> =
            by_id.keys().map(|id| (id.clone(), BTreeSet::new())).collect();
        for node in by_id.values() {
            for dep in &node.depends_on {
                match dependents.get_mut(dep) {
                    Some(set) => {
                        set.insert(node.id.clone());
                    }
                    None => {
                        return Err(PlanError::UnknownNode {
                            node: node.id.clone(),
                            missing: dep.clone(),
                        })
                    }
                }
            }
        }

        let graph = Self {
            name,
            nodes: by_id,
            dependents,
        };
        graph.validate()?;
        Ok(graph)
    }

    /// Check that every dependency resolves and that the edges form a DAG.
    pub fn validate(&self) -> Result<(), PlanError> {
        for node in self.nodes.values() {
            if let Some(missing) = node.depends_on.iter().find(|d| !self.nodes.contains_key(*d)) {
                return Err(PlanError::UnknownNode {
                    node: node.id.clone(),
                    missing: missing.clone(),
                });
            }
        }

        let order = self.kahn_order();
        if order.len() != self.nodes.len() {
            let visited: BTreeSet<&NodeId> = order.iter().collect();
            let unvisited = self.nodes.keys().filter(|id| !visited.contains(id)).collect();
            let nodes = self.cycle_members(unvisited).into_iter().cloned().collect();
            return Err(PlanError::Cycle { nodes });
        }
        Ok(())
    }

    /// Narrow the nodes Kahn never reached down to the ones on a cycle by
    /// peeling off those no other remaining node depends on.
    fn cycle_members<'a>(&'a self, mut remaining: BTreeSet<&'a NodeId>) -> BTreeSet<&'a NodeId> {
        loop {
            let downstream: Vec<&NodeId> = remaining
                .iter()
                .filter(|id| !self.dependents_of(id).any(|d| remaining.contains(d)))
                .copied()
                .collect();
            if downstream.is_empty() {
                return remaining;
            }
            for id in downstream {
                remaining.remove(id);
            }
        }
    }

    /// Kahn's algorithm, ascending id among simultaneously ready nodes.
    /// Returns fewer ids than nodes when a cycle exists.
    fn kahn_order(&self) -> Vec<NodeId> {
        let mut in_degree: BTreeMap<&NodeId, usize> = self
            .nodes
            .values()
            .map(|n| (&n.id, n.depends_on.len()))
            .collect();
        let mut ready: BTreeSet<&NodeId> = in_degree
            .iter()
            .filter(|(_, d)| **d == 0)
            .map(|(id, _)| *id)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(id) = ready.pop_first() {
            order.push(id.clone());
            for dependent in self.dependents.get(id).into_iter().flatten() {
                if let Some(d) = in_degree.get_mut(dependent) {
                    *d -= 1;
                    if *d == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }
        order
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only view of the nodes, in ascending id order.
    pub fn nodes(&self) -> impl Iterator<Item = &ExecutionNode> {
        self.nodes.values()
    }

    pub fn node(&self, id: &NodeId) -> Option<&ExecutionNode> {
        self.nodes.get(id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Distinct engine names referenced by the plan.
    pub fn engine_names(&self) -> BTreeSet<String> {
        self.nodes.values().map(|n| n.engine.clone()).collect()
    }

    /// Nodes that list `id` directly in their `depends_on`.
    pub fn dependents_of(&self, id: &NodeId) -> impl Iterator<Item = &NodeId> {
        self.dependents.get(id).into_iter().flatten()
    }

    /// Every node that transitively depends on `id` (not including `id`).
    pub fn transitive_dependents(&self, id: &NodeId) -> BTreeSet<NodeId> {
        let mut found = BTreeSet::new();
        let mut stack: Vec<&NodeId> = self.dependents_of(id).collect();
        while let Some(next) = stack.pop() {
            if found.insert(next.clone()) {
                stack.extend(self.dependents_of(next));
            }
        }
        found
    }

    /// A deterministic topological order (ascending id tie-break).
    pub fn topological_order(&self) -> Vec<NodeId> {
        self.kahn_order()
    }
}
