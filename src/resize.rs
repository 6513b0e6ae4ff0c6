// ABOUTME: Pure instance-count arithmetic for upsize and downsize steps.
// ABOUTME: Handles percentage/absolute inputs, policy versions, and clamping.

use serde::{Deserialize, Serialize};

/// How the requested value is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountUnit {
    Percentage,
    Absolute,
}

/// Whether the step grows the new unit or shrinks the old ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResizeDirection {
    Upsize,
    Downsize,
}

/// Order of operations when shifting traffic between old and new units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ResizeStrategy {
    /// Grow the new unit before shrinking the old ones.
    #[default]
    UpscaleNewFirst,
    /// Shrink the old units before growing the new one.
    DownscaleOldFirst,
}

/// Transient input to the calculator; recomputed on every phase execution.
#[derive(Debug, Clone, Copy)]
pub struct ResizeRequest {
    /// Ceiling derived from the manifest or the current running count.
    pub max_count: u32,
    /// User-requested value, interpreted per `unit`.
    pub requested: u32,
    pub unit: CountUnit,
    pub direction: ResizeDirection,
    /// Downsize-to semantics instead of the legacy downsize-by-complement.
    pub downsize_policy_v2: bool,
    /// Whether the user supplied an explicit downsize value.
    /// The v2 policy only applies when they did.
    pub user_supplied_downsize: bool,
}

/// Default instance count when matching a running count that is zero or unknown.
pub const DEFAULT_RUNNING_COUNT: u32 = 2;

/// Resolve "match the currently running count" requests.
///
/// A brand-new service has nothing running yet, so zero or unknown falls
/// back to a small fixed default rather than deploying nothing.
pub fn current_running_default(running: Option<u32>) -> u32 {
    match running {
        None | Some(0) => DEFAULT_RUNNING_COUNT,
        Some(n) => n,
    }
}

/// Compute the target instance count for a resize step.
///
/// Percentages are clamped to [0, 100] before use. Upsizing never lands
/// below one instance; downsizing never goes negative. The alternate
/// downsize policy (downsize *to* the value instead of *by* it) takes
/// effect only when both the policy flag is set and the user supplied an
/// explicit value.
pub fn compute_target_count(request: &ResizeRequest) -> u32 {
    let max = request.max_count;
    let downsize_to = request.downsize_policy_v2 && request.user_supplied_downsize;

    match (request.unit, request.direction) {
        (CountUnit::Percentage, ResizeDirection::Upsize) => {
            percent_of(max, request.requested).max(1)
        }
        (CountUnit::Percentage, ResizeDirection::Downsize) => {
            let share = percent_of(max, request.requested);
            if downsize_to {
                share
            } else {
                max.saturating_sub(share)
            }
        }
        (CountUnit::Absolute, ResizeDirection::Upsize) => request.requested.min(max),
        (CountUnit::Absolute, ResizeDirection::Downsize) => {
            if downsize_to {
                request.requested
            } else {
                max.saturating_sub(request.requested)
            }
        }
    }
}

fn percent_of(max: u32, requested: u32) -> u32 {
    let pct = requested.min(100);
    ((f64::from(pct) * f64::from(max)) / 100.0).round() as u32
}
