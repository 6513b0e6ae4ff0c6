// ABOUTME: Command descriptors and result contract for the external worker.
// ABOUTME: Submitting returns a correlation id; exactly one result follows.

use std::time::Duration;

use async_trait::async_trait;
use nonempty::NonEmpty;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::{ManifestFile, ManifestPackage, OverrideLevel};
use crate::resize::ResizeStrategy;
use crate::types::{AppName, CorrelationId, CredentialHandle, InfraTarget, Route};
use crate::unit::{DeploymentUnit, InstanceUpdate, NamingStrategy, UnitTarget};

/// Platform CLI version the worker should invoke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CliVersion {
    #[default]
    V6,
    V7,
}

/// A unit of remote work, submitted to the external worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandDescriptor {
    pub command: CommandSpec,
    pub target: InfraTarget,
    pub credential: CredentialHandle,
    /// Enforced by the worker and the host engine; the orchestrator keeps
    /// no local timer.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    pub cli_version: CliVersion,
    pub enforce_ssl_validation: bool,
    pub use_app_autoscaler: bool,
}

/// Command-specific parameters. Rollback is expressed through the
/// parameters (inverted counts, reversed swap), never a separate command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandSpec {
    FetchFiles(FetchFilesSpec),
    Setup(SetupSpec),
    Resize(ResizeSpec),
    RouteSwap(RouteSwapSpec),
}

/// Gather manifest files from remote or scripted sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchFilesSpec {
    pub requests: Vec<FetchRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchRequest {
    pub level: OverrideLevel,
    pub source: FetchSource,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FetchSource {
    /// Fetch files from source control.
    Git {
        repo: String,
        branch: String,
        paths: Vec<String>,
    },
    /// Run a user-supplied script producing files at `output_paths`.
    Script {
        script: String,
        output_paths: Vec<String>,
    },
}

/// Create the new application version and identify units to downsize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupSpec {
    pub app_name_prefix: AppName,
    pub manifests: ManifestPackage,
    /// Routes the unit is created with (temporary ones under blue/green).
    pub routes: Vec<Route>,
    pub max_count: u32,
    pub resize_strategy: ResizeStrategy,
    pub naming: NamingStrategy,
    pub blue_green: bool,
    /// How many retired versions to keep around for rollback.
    pub old_versions_to_keep: u32,
    /// Rollback: delete this unit and restore the previously downsized ones.
    pub revert: Option<SetupRevert>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetupRevert {
    pub delete_unit: AppName,
    pub restore_units: Vec<UnitTarget>,
}

/// Resize the new unit up and the old units down (or the inverse).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResizeSpec {
    pub unit: AppName,
    pub target_count: u32,
    /// Counts to apply to the prior versions alongside the main resize.
    pub old_unit_targets: Vec<UnitTarget>,
    pub strategy: ResizeStrategy,
}

/// Remap routes between old and new units for a blue/green cutover.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteSwapSpec {
    pub new_unit: AppName,
    pub old_units: Vec<AppName>,
    pub final_routes: Vec<Route>,
    /// Blue/green swaps are meaningless without a staging route to swap
    /// away from, so emptiness is unrepresentable here.
    pub temp_routes: NonEmpty<Route>,
    pub direction: SwapDirection,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SwapDirection {
    /// Map final routes to the new unit, staging routes to the old ones.
    ToNew,
    /// Reverse of `ToNew`; used by rollback.
    ToOld,
}

impl SwapDirection {
    pub fn reversed(self) -> SwapDirection {
        match self {
            SwapDirection::ToNew => SwapDirection::ToOld,
            SwapDirection::ToOld => SwapDirection::ToNew,
        }
    }
}

/// Terminal status reported by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Success,
    Failure,
}

/// The single asynchronous result delivered for a correlation id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResult {
    pub correlation: CorrelationId,
    pub status: TaskStatus,
    pub error_message: Option<String>,
    pub payload: TaskPayload,
}

/// Command-specific result payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TaskPayload {
    None,
    Files(Vec<FetchedLevel>),
    Setup {
        new_unit: DeploymentUnit,
        downsized_units: Vec<DeploymentUnit>,
    },
    Resize {
        units: Vec<InstanceUpdate>,
    },
    RouteSwap {
        bindings: Vec<RouteBinding>,
    },
}

/// Files fetched for one override level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedLevel {
    pub level: OverrideLevel,
    pub files: Vec<ManifestFile>,
}

/// Route mapping after a swap, as observed by the worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteBinding {
    pub unit: AppName,
    pub routes: Vec<Route>,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("worker rejected task: {0}")]
    Rejected(String),

    #[error("worker unavailable: {0}")]
    Unavailable(String),
}

/// Submits remote work and hands back a correlation id synchronously.
///
/// The host engine later delivers exactly one `TaskResult` for that id via
/// `Orchestrator::resume`. Implementations must not block on the task
/// itself.
#[async_trait]
pub trait TaskDispatcher: Send + Sync {
    async fn submit(&self, descriptor: CommandDescriptor) -> Result<CorrelationId, DispatchError>;
}
