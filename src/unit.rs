// ABOUTME: DeploymentUnit descriptor and per-unit instance accounting.
// ABOUTME: The only entity whose live remote state changes across phases.

use serde::{Deserialize, Serialize};

use crate::types::{AppName, Route};

/// How new application versions are named on the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum NamingStrategy {
    /// Each version gets a numeric suffix; the old version keeps running
    /// under its own name until retired.
    #[default]
    Versioned,
    /// The app keeps one stable name; versions are distinguished remotely.
    NonVersioned,
}

/// One deployable application instance-group on the target platform.
///
/// Created by Setup, mutated (remotely) by Resize and Route-Swap, retired
/// by a later Setup's cleanup. The orchestrator records intent and consumes
/// results; it never mutates the remote unit itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentUnit {
    pub name: AppName,
    pub routes: Vec<Route>,
    pub instance_count: u32,
    pub is_new_version: bool,
    pub naming: NamingStrategy,
}

/// Before/after instance counts for one unit, reported by a resize task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceUpdate {
    pub name: AppName,
    pub before: u32,
    pub after: u32,
}

/// A unit and the instance count a command should take it to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitTarget {
    pub name: AppName,
    pub count: u32,
}
