//! Engine trait — the contract enhancement engines implement

use crate::content::ContentItem;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How an engine can process a given item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// The engine does not apply to this item. Not an error.
    CannotEnhance,
    /// Fast enough to run inline on the scheduling task.
    Synchronous,
    /// Should be handed to the worker pool.
    Asynchronous,
}

/// Why an engine invocation did not complete.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("engine '{0}' is not registered")]
    NotFound(String),
    #[error("engine cannot process content: {0}")]
    UnsupportedContent(String),
    #[error("engine interrupted by cancellation")]
    Interrupted,
    #[error("engine panicked: {0}")]
    Panicked(String),
    #[error("engine error: {0}")]
    Internal(String),
}

impl EngineError {
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

/// The contract enhancement engines implement.
///
/// The scheduler calls `probe` at most once per node per run, at the moment
/// the node becomes eligible, so it may depend on metadata written by
/// upstream engines. `apply` may append to the item's metadata store; it
/// should add either a complete batch of statements or none.
#[async_trait]
pub trait Engine: Send + Sync {
    /// Engine name, matched against execution node engine names.
    fn id(&self) -> &str;

    /// Side-effect-free applicability check.
    fn probe(&self, item: &ContentItem) -> Capability;

    /// Enhance the item.
    async fn apply(&self, item: &ContentItem) -> Result<(), EngineError>;
}
