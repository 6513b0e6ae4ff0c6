// ABOUTME: Phase lifecycle: plans, state machine, rollback inversion.
// ABOUTME: The orchestrator here is the crate's single stateful entry point.

mod context;
mod orchestrator;
mod rollback;
mod state;

pub use context::{
    LevelInput, LevelSource, PhaseContext, PhaseKind, PhasePlan, PhaseSpec, ResizePlan, SetupPlan,
};
pub use orchestrator::{Orchestrator, ROLLBACK_SKIP_MESSAGE};
pub use rollback::{invert_resize, invert_setup, invert_swap, rollback_applies};
pub use state::{PhaseStatus, PhaseTransition};

use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::manifest::ManifestError;
use crate::routes::RouteResolveError;
use crate::store::StoreError;
use crate::types::{AppNameError, CorrelationId};

#[derive(Debug, Error)]
pub enum PhaseError {
    /// A result arrived for a task this orchestrator never dispatched, or
    /// one already consumed. Results are delivered exactly once.
    #[error("no pending phase for correlation id '{0}'")]
    UnknownCorrelation(CorrelationId),

    /// The worker answered with a payload that does not match the command
    /// it was given.
    #[error("task result payload does not match the dispatched command")]
    UnexpectedPayload,

    /// Resize and route-swap phases need a completed setup to act on.
    #[error("no successful setup found in this or any preceding phase")]
    SetupNotCompleted,

    #[error("route swapping requires a blue-green deployment")]
    NotBlueGreen,

    /// Blue/green needs at least one temporary route to stage the new
    /// version on before the cutover.
    #[error("no temporary routes configured for blue-green deployment")]
    EmptyTempRoutes,

    /// A rollback phase must name the forward phase it undoes.
    #[error("rollback phase does not reference a forward phase")]
    MissingRollbackTarget,

    #[error("forward snapshot holds no {0} state to invert")]
    NothingToInvert(&'static str),

    #[error(transparent)]
    Name(#[from] AppNameError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Routes(#[from] RouteResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}
