//! Run results and the failures surfaced to callers

use super::state::NodeRunState;
use crate::engine::{Capability, EngineError};
use crate::jobs::JobError;
use crate::plan::{NodeId, PlanError};
use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;
use thiserror::Error;

fn serialize_error<S: Serializer>(error: &Option<EngineError>, s: S) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => s.serialize_some(&e.to_string()),
        None => s.serialize_none(),
    }
}

/// What happened to one node during a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeOutcome {
    pub node: NodeId,
    pub engine: String,
    pub optional: bool,
    pub state: NodeRunState,
    /// Capability reported by the probe, if the node was probed
    pub capability: Option<Capability>,
    #[serde(serialize_with = "serialize_error")]
    pub error: Option<EngineError>,
    /// Why the node was skipped, if it was
    pub skip_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl NodeOutcome {
    pub(crate) fn pending(node: NodeId, engine: String, optional: bool) -> Self {
        Self {
            node,
            engine,
            optional,
            state: NodeRunState::Pending,
            capability: None,
            error: None,
            skip_reason: None,
            started_at: None,
            completed_at: None,
        }
    }
}

/// Overall verdict of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// Every node completed or was skipped without failure
    Success,
    /// Only optional nodes failed
    PartialFailure,
    /// A required node failed or the run was cancelled
    Failure,
}

/// Per-node outcomes plus the aggregate verdict of one chain execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub chain: String,
    pub item_uri: String,
    pub outcome: RunOutcome,
    pub cancelled: bool,
    pub nodes: BTreeMap<NodeId, NodeOutcome>,
    /// Order in which nodes left READY (probed and dispatched or skipped)
    pub dispatch_order: Vec<NodeId>,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl RunResult {
    pub fn state_of(&self, node: &NodeId) -> Option<NodeRunState> {
        self.nodes.get(node).map(|o| o.state)
    }

    pub fn is_success(&self) -> bool {
        self.outcome == RunOutcome::Success
    }

    fn nodes_in(&self, state: NodeRunState) -> Vec<&NodeId> {
        self.nodes
            .values()
            .filter(|o| o.state == state)
            .map(|o| &o.node)
            .collect()
    }

    pub fn completed_nodes(&self) -> Vec<&NodeId> {
        self.nodes_in(NodeRunState::Completed)
    }

    pub fn failed_nodes(&self) -> Vec<&NodeId> {
        self.nodes_in(NodeRunState::Failed)
    }

    pub fn skipped_nodes(&self) -> Vec<&NodeId> {
        self.nodes_in(NodeRunState::Skipped)
    }

    /// Optional nodes that failed (the reason for `PartialFailure`).
    pub fn failed_optional_nodes(&self) -> Vec<&NodeId> {
        self.nodes
            .values()
            .filter(|o| o.optional && o.state == NodeRunState::Failed)
            .map(|o| &o.node)
            .collect()
    }

    pub fn duration(&self) -> chrono::Duration {
        self.completed_at - self.started_at
    }
}

/// A required node failed. Carries the graph context of the failing node
/// and the full run result.
#[derive(Debug, Clone, PartialEq, Error)]
#[error(
    "chain '{}' failed at node '{node}' (engine '{engine}', optional: {optional}): {cause}",
    .result.chain
)]
pub struct ChainFailure {
    pub node: NodeId,
    pub engine: String,
    pub optional: bool,
    /// Dependencies of the failed node that did not complete
    pub unmet_dependencies: BTreeSet<NodeId>,
    pub cause: EngineError,
    pub result: RunResult,
}

/// Errors returned by a chain run.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid execution plan: {0}")]
    Plan(#[from] PlanError),

    #[error(transparent)]
    ChainFailure(Box<ChainFailure>),

    #[error("chain '{}' was cancelled", .result.chain)]
    Cancelled { result: Box<RunResult> },

    #[error("chain '{}' exceeded its deadline of {:?}", .result.chain, .limit)]
    DeadlineExceeded { limit: Duration, result: Box<RunResult> },

    #[error("no engines are active; cannot build a default chain")]
    NoEngines,

    #[error("chain '{0}' is not registered")]
    UnknownChain(String),

    #[error("chain job could not be started: {0}")]
    Job(#[from] JobError),
}

impl SchedulerError {
    /// The per-node outcomes behind this error, if the run started.
    pub fn run_result(&self) -> Option<&RunResult> {
        match self {
            Self::ChainFailure(failure) => Some(&failure.result),
            Self::Cancelled { result } | Self::DeadlineExceeded { result, .. } => Some(result.as_ref()),
            Self::Plan(_) | Self::NoEngines | Self::UnknownChain(_) | Self::Job(_) => None,
        }
    }
}
