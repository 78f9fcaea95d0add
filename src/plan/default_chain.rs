//! Implicit linear chain over every active engine

use super::graph::{ExecutionPlanGraph, PlanError};
use super::node::ExecutionNode;
use crate::engine::EngineRegistry;

/// Name given to plans built from the active engine set.
pub const DEFAULT_CHAIN_NAME: &str = "default";

/// Builds the fallback chain used when no explicit plan is supplied.
///
/// One required node per engine, ordered by ascending priority (ties by
/// ascending name), each depending on its predecessor. No parallelism.
#[derive(Debug, Clone)]
pub struct DefaultChainBuilder {
    name: String,
}

impl DefaultChainBuilder {
    pub fn new() -> Self {
        Self {
            name: DEFAULT_CHAIN_NAME.to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Build a strict linear chain from `(name, priority)` pairs.
    pub fn build_default(&self, mut engines: Vec<(String, i32)>) -> Result<ExecutionPlanGraph, PlanError> {
        if engines.is_empty() {
            return Err(PlanError::EmptyPlan(self.name.clone()));
        }
        engines.sort_by(|(a_name, a_prio), (b_name, b_prio)| {
            a_prio.cmp(b_prio).then_with(|| a_name.cmp(b_name))
        });

        let mut nodes: Vec<ExecutionNode> = Vec::with_capacity(engines.len());
        for (engine, _) in engines {
            let mut node = ExecutionNode::for_engine(engine);
            if let Some(previous) = nodes.last() {
                node = node.depends_on(previous.id.clone());
            }
            nodes.push(node);
        }

        tracing::debug!(
            chain = %self.name,
            engines = nodes.len(),
            "built default chain"
        );
        ExecutionPlanGraph::new(self.name.clone(), nodes)
    }

    /// Build from the registry's currently active engines.
    pub fn from_registry(&self, registry: &dyn EngineRegistry) -> Result<ExecutionPlanGraph, PlanError> {
        self.build_default(registry.list_active_engines())
    }
}

impl Default for DefaultChainBuilder {
    fn default() -> Self {
        Self::new()
    }
}
