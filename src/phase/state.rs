// ABOUTME: Phase lifecycle states and the transition value returned to hosts.
// ABOUTME: Terminal states map onto process-style exit codes for operators.

use serde::{Deserialize, Serialize};

use crate::snapshot::PhaseSnapshot;
use crate::types::CorrelationId;

/// Where a phase is in its lifecycle.
///
/// Every phase starts in `ResolvingInputs`. `Completed`, `Skipped`, and
/// `Failed` are terminal; `Dispatched` means exactly one remote task is
/// outstanding and the phase is suspended until its result arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseStatus {
    ResolvingInputs,
    Dispatched,
    Completed,
    Skipped,
    Failed,
}

impl PhaseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            PhaseStatus::Completed | PhaseStatus::Skipped | PhaseStatus::Failed
        )
    }

    /// Operator-facing exit code; `None` while the phase is still running.
    /// Skipped is a success from the workflow's point of view.
    pub fn exit_code(self) -> Option<i32> {
        match self {
            PhaseStatus::Completed | PhaseStatus::Skipped => Some(0),
            PhaseStatus::Failed => Some(1),
            PhaseStatus::ResolvingInputs | PhaseStatus::Dispatched => None,
        }
    }
}

/// The observable outcome of `begin`, `resume`, or `abort`.
#[derive(Debug, Clone)]
pub struct PhaseTransition {
    pub status: PhaseStatus,
    /// Present while a remote task is outstanding.
    pub correlation: Option<CorrelationId>,
    /// Informational or error text for user display.
    pub message: Option<String>,
    /// Present once the phase completed and its snapshot was stored.
    pub snapshot: Option<PhaseSnapshot>,
}

impl PhaseTransition {
    pub fn dispatched(correlation: CorrelationId) -> Self {
        Self {
            status: PhaseStatus::Dispatched,
            correlation: Some(correlation),
            message: None,
            snapshot: None,
        }
    }

    pub fn completed(snapshot: PhaseSnapshot) -> Self {
        Self {
            status: PhaseStatus::Completed,
            correlation: None,
            message: None,
            snapshot: Some(snapshot),
        }
    }

    pub fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: PhaseStatus::Skipped,
            correlation: None,
            message: Some(message.into()),
            snapshot: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: PhaseStatus::Failed,
            correlation: None,
            message: Some(message.into()),
            snapshot: None,
        }
    }
}
