//! Per-run node state machine
//!
//! `PENDING → READY → RUNNING → {COMPLETED, FAILED, SKIPPED}`. A node may
//! also go straight from `PENDING`/`READY` to `SKIPPED` (upstream required
//! failure, cancellation, `CannotEnhance`) and from `READY` to a terminal
//! state when it runs inline.

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NodeRunState {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl NodeRunState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(self, next: NodeRunState) -> bool {
        use NodeRunState::*;
        match (self, next) {
            (Pending, Ready) | (Pending, Skipped) => true,
            (Ready, Running) | (Ready, Skipped) => true,
            (Ready, Completed) | (Ready, Failed) => true,
            (Running, Completed) | (Running, Failed) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for NodeRunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Ready => "READY",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
            Self::Skipped => "SKIPPED",
        };
        f.write_str(s)
    }
}
