// ABOUTME: Immutable per-phase output record consumed by downstream phases.
// ABOUTME: Written once on successful completion; default means "nothing ran".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dispatch::{CliVersion, SwapDirection};
use crate::manifest::ManifestPackage;
use crate::resize::ResizeStrategy;
use crate::types::{AppName, Route};
use crate::unit::{DeploymentUnit, InstanceUpdate};

/// Everything a phase leaves behind for later phases (and rollback).
///
/// At most one snapshot exists per key; once written it is never mutated.
/// `PhaseSnapshot::default()` is the legitimate "forward phase never ran"
/// value returned when no predecessor exists, with `is_success` false so
/// rollback phases know to skip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseSnapshot {
    pub is_success: bool,
    pub updated_at: Option<DateTime<Utc>>,

    /// The unit created by Setup.
    pub new_unit: Option<DeploymentUnit>,
    /// Prior versions scheduled for downsizing.
    pub downsize_units: Vec<DeploymentUnit>,

    pub max_count: Option<u32>,
    pub desired_count: Option<u32>,
    pub resize_strategy: ResizeStrategy,

    pub final_routes: Vec<Route>,
    pub temp_routes: Vec<Route>,
    pub use_temp_routes: bool,
    pub blue_green: bool,

    pub manifests: Option<ManifestPackage>,

    /// Per-unit before/after counts reported by a resize task.
    pub instance_updates: Vec<InstanceUpdate>,
    /// Route bindings applied by a swap task.
    pub route_swap: Option<RouteSwapRecord>,

    pub enforce_ssl_validation: bool,
    pub use_app_autoscaler: bool,
    pub cli_version: CliVersion,
}

impl PhaseSnapshot {
    /// Whether there is any forward work to roll back.
    pub fn completed_successfully(&self) -> bool {
        self.is_success
    }
}

/// The route-swap configuration a swap phase executed, kept verbatim so a
/// rollback can run the structural inverse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSwapRecord {
    pub new_unit: AppName,
    pub old_units: Vec<AppName>,
    pub final_routes: Vec<Route>,
    pub temp_routes: Vec<Route>,
    pub direction: SwapDirection,
}
