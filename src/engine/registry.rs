//! Engine registry — name → implementation lookup plus priorities

use super::traits::Engine;
use dashmap::DashMap;
use std::sync::Arc;

/// Source of active engines, injected into the default chain builder and
/// the scheduler.
pub trait EngineRegistry: Send + Sync {
    /// Currently active engines as `(name, priority)`. Order is unspecified.
    fn list_active_engines(&self) -> Vec<(String, i32)>;

    /// Bind an engine name to its implementation.
    fn resolve_engine(&self, name: &str) -> Option<Arc<dyn Engine>>;
}

struct Registration {
    engine: Arc<dyn Engine>,
    priority: i32,
}

/// Registry backed by an in-process map, populated by whatever wires the
/// system together.
#[derive(Default)]
pub struct StaticEngineRegistry {
    engines: DashMap<String, Registration>,
}

impl StaticEngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an engine under its `id()`. Replaces any engine with the same id.
    pub fn register(&self, engine: Arc<dyn Engine>, priority: i32) {
        let name = engine.id().to_string();
        tracing::debug!(engine = %name, priority, "engine registered");
        self.engines.insert(name, Registration { engine, priority });
    }

    /// Builder-style variant of [`register`](Self::register).
    pub fn with_engine(self, engine: Arc<dyn Engine>, priority: i32) -> Self {
        self.register(engine, priority);
        self
    }

    /// Remove an engine. Returns true if it was registered.
    pub fn unregister(&self, name: &str) -> bool {
        self.engines.remove(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

impl EngineRegistry for StaticEngineRegistry {
    fn list_active_engines(&self) -> Vec<(String, i32)> {
        self.engines
            .iter()
            .map(|r| (r.key().clone(), r.value().priority))
            .collect()
    }

    fn resolve_engine(&self, name: &str) -> Option<Arc<dyn Engine>> {
        self.engines.get(name).map(|r| r.value().engine.clone())
    }
}
