//! Execution node: one scheduled engine invocation

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Identifier of a node, unique within its plan.
///
/// Ordered so that simultaneously ready nodes dispatch in ascending id order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// One step of a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionNode {
    pub id: NodeId,
    /// Name of the engine bound to this node
    pub engine: String,
    /// Optional nodes never block their dependents when they fail
    #[serde(default)]
    pub optional: bool,
    #[serde(default)]
    pub depends_on: BTreeSet<NodeId>,
}

impl ExecutionNode {
    /// A required node with no dependencies.
    pub fn new(id: impl Into<NodeId>, engine: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            engine: engine.into(),
            optional: false,
            depends_on: BTreeSet::new(),
        }
    }

    /// A node whose id is its engine name.
    pub fn for_engine(engine: impl Into<String>) -> Self {
        let engine = engine.into();
        Self::new(engine.clone(), engine)
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = optional;
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<NodeId>) -> Self {
        self.depends_on.insert(dependency.into());
        self
    }
}
