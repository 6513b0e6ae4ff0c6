// ABOUTME: Write-once phase snapshot store scoped to a workflow execution.
// ABOUTME: Exposes direct reads plus fallback into the preceding phase.

mod fallback;
mod memory;

pub use fallback::FallbackReader;
pub use memory::MemoryStore;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::snapshot::PhaseSnapshot;
use crate::types::{ExecutionId, PhaseName};

/// Identifies one phase's output within a workflow execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub execution_id: ExecutionId,
    pub phase_name: PhaseName,
    pub rollback: bool,
}

impl SnapshotKey {
    pub fn forward(execution_id: ExecutionId, phase_name: PhaseName) -> Self {
        Self {
            execution_id,
            phase_name,
            rollback: false,
        }
    }

    pub fn rollback(execution_id: ExecutionId, phase_name: PhaseName) -> Self {
        Self {
            execution_id,
            phase_name,
            rollback: true,
        }
    }

    /// The same phase position, other direction.
    pub fn counterpart(&self) -> SnapshotKey {
        SnapshotKey {
            execution_id: self.execution_id.clone(),
            phase_name: self.phase_name.clone(),
            rollback: !self.rollback,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    /// Snapshots are append-only per key; a second write is a bug in the
    /// calling phase, not a race to resolve.
    #[error("snapshot already written for phase '{0}'")]
    AlreadyWritten(PhaseName),

    /// Fatal consistency error: the preceding phase targeted a different
    /// service or infrastructure, so its state must not be borrowed.
    #[error("different infrastructure or service on workflow phases")]
    PhaseMismatch,

    /// The host engine has no record of a phase it should know about.
    #[error("no execution record for phase '{0}'")]
    UnknownPhase(PhaseName),

    #[error("snapshot store backend error: {0}")]
    Backend(String),
}

/// Point-lookup snapshot persistence. Logically a key/value document
/// store; implementations may serialize `PhaseSnapshot` however they like.
pub trait SnapshotStore: Send + Sync {
    /// Persist a snapshot. Exactly once per key; a repeat write fails and
    /// leaves the original intact.
    fn write(&self, key: SnapshotKey, snapshot: PhaseSnapshot) -> Result<(), StoreError>;

    fn read(&self, key: &SnapshotKey) -> Result<Option<PhaseSnapshot>, StoreError>;
}
