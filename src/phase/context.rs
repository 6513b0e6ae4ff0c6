// ABOUTME: Per-phase execution context and the user-authored phase plan.
// ABOUTME: Plans are pure data; the orchestrator resolves them into commands.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dispatch::CliVersion;
use crate::manifest::{ManifestFile, OverrideLevel};
use crate::resize::{CountUnit, ResizeStrategy};
use crate::types::{
    AccountId, ActivityId, CredentialHandle, ExecutionId, InfraTarget, PhaseName, Route, ServiceId,
};
use crate::unit::NamingStrategy;

/// Which deployment step a phase performs.
///
/// Rollback is a flag on `PhaseSpec`, not a separate kind: a rollback
/// phase runs the same step with inverted inputs read from the forward
/// phase's snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PhaseKind {
    Setup,
    Resize,
    SwapRoutes,
}

/// Identity and targeting for one phase execution, supplied by the host.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    pub execution_id: ExecutionId,
    pub activity_id: ActivityId,
    pub account_id: AccountId,
    pub service_id: ServiceId,
    pub phase_name: PhaseName,
    /// For rollback phases: the forward phase whose snapshot is inverted.
    pub rollback_of: Option<PhaseName>,
    pub infra: InfraTarget,
    pub credential: CredentialHandle,
    /// Routes declared on the infrastructure definition.
    pub infra_routes: Vec<Route>,
    /// Temporary (staging) routes declared on the infrastructure definition.
    pub infra_temp_routes: Vec<Route>,
    pub cli_version: CliVersion,
    pub enforce_ssl_validation: bool,
}

/// The user-authored configuration of one phase.
#[derive(Debug, Clone)]
pub struct PhaseSpec {
    pub rollback: bool,
    /// Carried on the dispatched task; enforcement is the worker's job.
    pub timeout: Duration,
    pub plan: PhasePlan,
}

impl PhaseSpec {
    pub fn kind(&self) -> PhaseKind {
        match self.plan {
            PhasePlan::Setup(_) => PhaseKind::Setup,
            PhasePlan::Resize(_) => PhaseKind::Resize,
            PhasePlan::SwapRoutes => PhaseKind::SwapRoutes,
        }
    }
}

#[derive(Debug, Clone)]
pub enum PhasePlan {
    Setup(SetupPlan),
    Resize(ResizePlan),
    /// Everything a swap needs lives in the setup phase's snapshot.
    SwapRoutes,
}

/// Inputs for creating the new application version.
#[derive(Debug, Clone)]
pub struct SetupPlan {
    /// Manifest sources per override level, lowest precedence first.
    pub levels: Vec<LevelInput>,
    /// May contain templating expressions; rendered before use.
    pub app_name_prefix: String,
    pub blue_green: bool,
    /// Routes configured directly on the phase, appended to resolved ones.
    pub extra_routes: Vec<Route>,
    /// Phase-level override for staging routes.
    pub temp_routes: Vec<Route>,
    /// Instance ceiling when the manifest does not pin one.
    pub max_instances: u32,
    /// Mirror the currently running version's instance count instead.
    pub match_running_instances: bool,
    pub current_running_count: Option<u32>,
    pub resize_strategy: ResizeStrategy,
    pub naming: NamingStrategy,
    /// Retired versions kept around for manual recovery.
    pub old_versions_to_keep: u32,
    pub use_app_autoscaler: bool,
}

/// Manifest files for one override level, inline or fetched on demand.
#[derive(Debug, Clone)]
pub struct LevelInput {
    pub level: OverrideLevel,
    pub source: LevelSource,
}

#[derive(Debug, Clone)]
pub enum LevelSource {
    Inline(Vec<ManifestFile>),
    Git {
        repo: String,
        branch: String,
        paths: Vec<String>,
    },
    Script {
        script: String,
        output_paths: Vec<String>,
    },
}

impl LevelSource {
    pub fn needs_fetch(&self) -> bool {
        !matches!(self, LevelSource::Inline(_))
    }
}

/// Inputs for the upsize/downsize step.
#[derive(Debug, Clone)]
pub struct ResizePlan {
    pub requested: u32,
    pub unit: CountUnit,
    /// Explicit downsize override; its presence gates the downsize-to
    /// policy and otherwise defaults to mirroring the upsize request.
    pub downsize_requested: Option<u32>,
    pub downsize_unit: Option<CountUnit>,
}
