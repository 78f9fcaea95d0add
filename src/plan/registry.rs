//! Named chains available to callers

use super::graph::ExecutionPlanGraph;
use dashmap::DashMap;
use std::sync::Arc;

/// Validated plans keyed by chain name.
///
/// Plans are stored behind `Arc` so concurrent runs share one immutable copy.
#[derive(Debug, Default)]
pub struct ChainRegistry {
    chains: DashMap<String, Arc<ExecutionPlanGraph>>,
    default_chain: Option<String>,
}

impl ChainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name the chain used when a caller asks for the default chain.
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_chain = Some(name.into());
        self
    }

    /// Register a plan under its own name, returning any plan it replaced.
    pub fn register(&self, plan: ExecutionPlanGraph) -> Option<Arc<ExecutionPlanGraph>> {
        let name = plan.name().to_string();
        tracing::debug!(chain = %name, nodes = plan.len(), "chain registered");
        self.chains.insert(name, Arc::new(plan))
    }

    pub fn get(&self, name: &str) -> Option<Arc<ExecutionPlanGraph>> {
        self.chains.get(name).map(|r| r.value().clone())
    }

    pub fn remove(&self, name: &str) -> Option<Arc<ExecutionPlanGraph>> {
        self.chains.remove(name).map(|(_, plan)| plan)
    }

    /// Registered chain names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.chains.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn default_chain_name(&self) -> Option<&str> {
        self.default_chain.as_deref()
    }

    /// The configured default chain, if it is registered.
    pub fn default_chain(&self) -> Option<Arc<ExecutionPlanGraph>> {
        self.default_chain.as_deref().and_then(|name| self.get(name))
    }

    pub fn len(&self) -> usize {
        self.chains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
