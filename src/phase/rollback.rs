// ABOUTME: Structural inversion of forward phase snapshots for rollback.
// ABOUTME: Pure functions; the orchestrator wraps results in command specs.

use nonempty::NonEmpty;

use super::PhaseError;
use super::context::PhaseKind;
use crate::dispatch::{ResizeSpec, RouteSwapSpec, SetupRevert};
use crate::snapshot::PhaseSnapshot;
use crate::unit::UnitTarget;

/// Whether the forward phase left anything behind worth undoing.
///
/// A successful snapshot that lacks the section this kind would invert
/// (e.g. a resize rollback finding only setup output through the fallback
/// chain) also means there is nothing to roll back.
pub fn rollback_applies(kind: PhaseKind, snapshot: &PhaseSnapshot) -> bool {
    if !snapshot.completed_successfully() {
        return false;
    }
    match kind {
        PhaseKind::Setup => snapshot.new_unit.is_some(),
        PhaseKind::Resize => !snapshot.instance_updates.is_empty(),
        PhaseKind::SwapRoutes => snapshot.route_swap.is_some(),
    }
}

/// Undo a setup: delete the new unit, restore the downsized old ones to
/// the counts they carried before setup touched them.
pub fn invert_setup(snapshot: &PhaseSnapshot) -> Result<SetupRevert, PhaseError> {
    let new_unit = snapshot
        .new_unit
        .as_ref()
        .ok_or(PhaseError::NothingToInvert("setup"))?;

    let restore_units = snapshot
        .downsize_units
        .iter()
        .map(|unit| UnitTarget {
            name: unit.name.clone(),
            count: unit.instance_count,
        })
        .collect();

    Ok(SetupRevert {
        delete_unit: new_unit.name.clone(),
        restore_units,
    })
}

/// Undo a resize: every unit goes back to its before-count. The previous
/// and desired counts swap roles; no fresh user input is consulted.
pub fn invert_resize(snapshot: &PhaseSnapshot) -> Result<ResizeSpec, PhaseError> {
    if snapshot.instance_updates.is_empty() {
        return Err(PhaseError::NothingToInvert("resize"));
    }

    let new_unit = snapshot
        .new_unit
        .as_ref()
        .ok_or(PhaseError::NothingToInvert("resize"))?;

    let mut target_count = 0;
    let mut old_unit_targets = Vec::new();
    for update in &snapshot.instance_updates {
        if update.name == new_unit.name {
            target_count = update.before;
        } else {
            old_unit_targets.push(UnitTarget {
                name: update.name.clone(),
                count: update.before,
            });
        }
    }

    Ok(ResizeSpec {
        unit: new_unit.name.clone(),
        target_count,
        old_unit_targets,
        strategy: snapshot.resize_strategy,
    })
}

/// Undo a route swap: the same bindings with the direction reversed.
pub fn invert_swap(snapshot: &PhaseSnapshot) -> Result<RouteSwapSpec, PhaseError> {
    let record = snapshot
        .route_swap
        .as_ref()
        .ok_or(PhaseError::NothingToInvert("route swap"))?;

    let temp_routes = NonEmpty::from_vec(record.temp_routes.clone())
        .ok_or(PhaseError::EmptyTempRoutes)?;

    Ok(RouteSwapSpec {
        new_unit: record.new_unit.clone(),
        old_units: record.old_units.clone(),
        final_routes: record.final_routes.clone(),
        temp_routes,
        direction: record.direction.reversed(),
    })
}
