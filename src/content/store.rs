//! Append-only metadata store shared by every engine in a run
//!
//! Engines only add statements. The store never exposes removal, so one
//! engine cannot retract what another engine wrote.

use serde::{Deserialize, Serialize};
use std::sync::{Mutex, PoisonError};

/// Object position of a statement: either a resource reference or a literal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Object {
    /// Reference to another resource (URI-like string)
    Resource(String),
    /// Plain literal with an optional language tag
    Literal {
        value: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },
}

impl Object {
    pub fn resource(uri: impl Into<String>) -> Self {
        Self::Resource(uri.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            language: None,
        }
    }

    pub fn lang_literal(value: impl Into<String>, language: impl Into<String>) -> Self {
        Self::Literal {
            value: value.into(),
            language: Some(language.into()),
        }
    }
}

/// A subject–predicate–object statement.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Statement {
    pub subject: String,
    pub predicate: String,
    pub object: Object,
}

impl Statement {
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: Object) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object,
        }
    }
}

/// The interface engines write annotations through.
///
/// Implementations must tolerate concurrent `append_statements` calls from
/// multiple worker tasks without losing updates. A batch is applied as a
/// unit: readers never observe half of a batch.
pub trait MetadataStore: Send + Sync + std::fmt::Debug {
    /// Append a batch of statements.
    fn append_statements(&self, batch: Vec<Statement>);

    /// Snapshot of every statement in append order.
    fn statements(&self) -> Vec<Statement>;

    /// Number of statements currently held.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statements whose subject matches `subject`.
    fn statements_about(&self, subject: &str) -> Vec<Statement> {
        self.statements()
            .into_iter()
            .filter(|s| s.subject == subject)
            .collect()
    }
}

/// In-memory store backed by a single mutex-guarded log.
#[derive(Debug, Default)]
pub struct MemoryStore {
    log: Mutex<Vec<Statement>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MetadataStore for MemoryStore {
    fn append_statements(&self, batch: Vec<Statement>) {
        if batch.is_empty() {
            return;
        }
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch);
    }

    fn statements(&self) -> Vec<Statement> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn len(&self) -> usize {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
