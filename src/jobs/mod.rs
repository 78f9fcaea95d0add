//! Async job registry
//!
//! Wraps long-running units of work (typically a chain run) in tracked,
//! cancellable tokio tasks addressed by a content-derived [`JobId`].

mod id;
mod registry;

pub use id::JobId;
pub use registry::{JobError, JobRegistry, JobStatus, RunnableUnit};
