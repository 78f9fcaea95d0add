//! Common test utilities for chain scheduling scenarios
//!
//! Scripted engines that record when they start and finish, so tests
//! can check dependency ordering and exactly-once execution.

pub mod mock_engine;

pub use mock_engine::{registry_of, Event, EventLog, MockEngine};
