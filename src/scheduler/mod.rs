//! Chain scheduler: drives a content item through an execution plan
//!
//! Nodes are dispatched in dependency order. Synchronous engines run inline
//! on the coordinating task; asynchronous engines go to a bounded worker
//! pool. A required failure skips its transitive dependents while
//! unrelated branches run to completion.

mod cancel;
mod chain_scheduler;
mod result;
mod state;


pub use cancel::CancellationToken;
pub use chain_scheduler::{ChainScheduler, DEFAULT_WORKERS};
pub use result::{ChainFailure, NodeOutcome, RunOutcome, RunResult, SchedulerError};
pub use state::NodeRunState;
