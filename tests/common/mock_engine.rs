//! Scripted engines for integration tests

use async_trait::async_trait;
use enhancer::{Capability, ContentItem, Engine, EngineError, Object, StaticEngineRegistry, Statement};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Start(String),
    End(String),
}

/// Ordered record of engine starts and ends, shared by every mock.
#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn starts(&self, engine: &str) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Start(n) if n == engine))
            .count()
    }

    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}

/// Engine that sleeps, annotates the item, and succeeds or fails as told.
pub struct MockEngine {
    name: String,
    capability: Capability,
    fails: bool,
    delay: Option<Duration>,
    log: EventLog,
}

impl MockEngine {
    pub fn new(name: impl Into<String>, capability: Capability, log: &EventLog) -> Self {
        Self {
            name: name.into(),
            capability,
            fails: false,
            delay: None,
            log: log.clone(),
        }
    }

    pub fn failing(mut self) -> Self {
        self.fails = true;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl Engine for MockEngine {
    fn id(&self) -> &str {
        &self.name
    }

    fn probe(&self, _item: &ContentItem) -> Capability {
        self.capability
    }

    async fn apply(&self, item: &ContentItem) -> Result<(), EngineError> {
        self.log.push(Event::Start(self.name.clone()));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.push(Event::End(self.name.clone()));
        if self.fails {
            return Err(EngineError::internal(format!("{} failed", self.name)));
        }
        item.append_statements(vec![Statement::new(
            item.uri(),
            "urn:test:enhancedBy",
            Object::literal(&self.name),
        )]);
        Ok(())
    }
}

pub fn registry_of(engines: Vec<MockEngine>) -> StaticEngineRegistry {
    let registry = StaticEngineRegistry::new();
    for engine in engines {
        registry.register(Arc::new(engine), 0);
    }
    registry
}
