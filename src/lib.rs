//! Enhancer: dependency-aware enhancement chains for content items
//!
//! Runs a content item through a DAG of enhancement engines, honoring
//! dependencies, optional steps, and engine capabilities, and writes every
//! engine's output into the item's shared metadata store.
//!
//! # Core Concepts
//!
//! - **Engines**: units of enhancement logic, probed for applicability
//!   then invoked, resolved by name through an [`EngineRegistry`]
//! - **Chains**: validated [`ExecutionPlanGraph`]s of nodes, each binding
//!   one engine, required or optional
//! - **Scheduler**: the [`ChainScheduler`] drives one item through one
//!   chain, running asynchronous engines on a bounded worker pool
//! - **Jobs**: chain runs submitted to the [`JobRegistry`] and addressed
//!   by a content-derived [`JobId`]
//!
//! # Example
//!
//! ```
//! use enhancer::{ContentItem, EnhancerApi, StaticEngineRegistry};
//! use std::sync::Arc;
//!
//! let api = EnhancerApi::new(Arc::new(StaticEngineRegistry::new()));
//! let item = ContentItem::from_text("Paris is the capital of France");
//! assert!(api.list_jobs().is_empty());
//! assert!(item.uri().starts_with("urn:"));
//! ```

pub mod api;
pub mod config;
pub mod content;
pub mod engine;
pub mod jobs;
pub mod logging;
pub mod plan;
pub mod scheduler;

pub use api::{EnhancerApi, JobReport};
pub use config::{ChainConfig, ConfigError, EnhancerConfig};
pub use content::{ContentItem, MemoryStore, MetadataStore, Object, Statement};
pub use engine::{Capability, Engine, EngineError, EngineRegistry, StaticEngineRegistry};
pub use jobs::{JobError, JobId, JobRegistry, JobStatus, RunnableUnit};
pub use plan::{
    parse_chain_line, parse_chain_list, ChainRegistry, DefaultChainBuilder, ExecutionNode,
    ExecutionPlanGraph, NodeId, PlanError, DEFAULT_CHAIN_NAME,
};
pub use scheduler::{
    CancellationToken, ChainFailure, ChainScheduler, NodeOutcome, NodeRunState, RunOutcome,
    RunResult, SchedulerError, DEFAULT_WORKERS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
