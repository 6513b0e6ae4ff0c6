// ABOUTME: Narrow collaborator traits supplied by the host workflow engine.
// ABOUTME: Injected into the orchestrator; never ambient global state.

use serde::{Deserialize, Serialize};

use crate::types::{AccountId, ActivityId, ExecutionId, InfraTarget, PhaseName, ServiceId};

/// Feature toggles evaluated per account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureFlag {
    /// Downsize *to* the requested value instead of *by* it.
    DownsizeToPolicy,
    /// Skip application-name normalization for this account.
    AllowSpecialCharsInAppName,
    /// Require exactly one application manifest after override resolution.
    SingleManifestSupport,
}

pub trait FeatureFlags: Send + Sync {
    fn is_enabled(&self, flag: FeatureFlag, account: &AccountId) -> bool;
}

/// Renders templating expressions embedded in workflow configuration.
/// Identity for plain strings.
pub trait ExpressionRenderer: Send + Sync {
    fn render(&self, expr: &str) -> String;
}

/// Outcome attached to an activity log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityOutcome {
    Running,
    Success,
    Failure,
    Skipped,
}

/// One user-visible line in the deployment's activity stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub activity_id: ActivityId,
    pub phase: PhaseName,
    pub outcome: ActivityOutcome,
    pub message: String,
}

/// Audit/activity sink. Failures to record must not fail the phase.
pub trait ActivityLog: Send + Sync {
    fn record(&self, entry: ActivityEntry);
}

/// What the host engine knows about one executed phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseRecord {
    pub phase_name: PhaseName,
    pub service_id: ServiceId,
    pub infra: InfraTarget,
}

/// Phase ordering and targeting metadata within one workflow execution.
///
/// Backs the snapshot fallback lookup: walking to the immediately
/// preceding phase and checking it targeted the same service and
/// infrastructure.
pub trait PhaseRegistry: Send + Sync {
    fn record(&self, execution: &ExecutionId, phase: &PhaseName) -> Option<PhaseRecord>;

    fn previous_phase(&self, execution: &ExecutionId, phase: &PhaseName) -> Option<PhaseRecord>;
}
