//! Execution plans: the immutable DAG a chain is run from
//!
//! Plans are validated once at construction. A plan that fails validation
//! is never handed to the scheduler.

mod chain_list;
mod default_chain;
mod graph;
mod node;
mod registry;

pub use chain_list::{parse_chain_list, parse_chain_line};
pub use default_chain::{DefaultChainBuilder, DEFAULT_CHAIN_NAME};
pub use graph::{ExecutionPlanGraph, PlanError};
pub use node::{ExecutionNode, NodeId};
pub use registry::ChainRegistry;
