//! Enhancement engine contract and name-based lookup
//!
//! Engines are external collaborators. This module only fixes the contract
//! the scheduler drives (probe, then apply) and the registry through which
//! a node's engine name is bound to an implementation.

mod registry;
mod traits;

pub use registry::{EngineRegistry, StaticEngineRegistry};
pub use traits::{Capability, Engine, EngineError};
