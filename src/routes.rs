// ABOUTME: Resolves which routes apply to a new or swapped deployment unit.
// ABOUTME: Merges manifest routes, infrastructure routes, and phase overrides.

use thiserror::Error;

use crate::manifest::{ManifestError, ManifestPackage, ROUTE_PLACEHOLDER_TOKEN};
use crate::types::Route;

#[derive(Debug, Error)]
pub enum RouteResolveError {
    #[error("invalid route '{value}': {source}")]
    InvalidRoute {
        value: String,
        source: crate::types::RouteError,
    },

    #[error(
        "final routes can not be empty for blue-green deployment; \
         make sure the manifest contains routes, no-route cannot be used"
    )]
    EmptyBlueGreenRoutes,

    #[error(transparent)]
    Manifest(#[from] ManifestError),
}

/// Routes from the manifest, falling back to infrastructure-declared routes.
///
/// Decision tree, in order: no `routes:` key and no `no-route:` flag means
/// the infrastructure routes apply; an explicit `no-route: true` means no
/// routes at all; a single entry equal to the deprecated placeholder token
/// substitutes the infrastructure list; otherwise every declared literal is
/// used verbatim, in declaration order.
pub fn manifest_routes(
    package: &ManifestPackage,
    infra_routes: &[Route],
) -> Result<Vec<Route>, RouteResolveError> {
    let entries = package.route_entries()?;

    match entries {
        None => {
            if package.declares_no_route()? {
                Ok(Vec::new())
            } else {
                Ok(infra_routes.to_vec())
            }
        }
        Some(entries) if entries.len() == 1 && entries[0] == ROUTE_PLACEHOLDER_TOKEN => {
            Ok(infra_routes.to_vec())
        }
        Some(entries) => entries.iter().map(|e| parse_route(e)).collect(),
    }
}

/// The routes the new unit ultimately receives traffic on.
///
/// Extra routes configured directly on the phase are appended after the
/// manifest-resolved ones. Under blue/green the platform push cannot do
/// variable substitution for us (the unit is created on temporary routes
/// and these are only mapped at swap time), so `((var))` references are
/// expanded here; an empty result is a validation error in that mode.
pub fn resolve_final_routes(
    package: &ManifestPackage,
    infra_routes: &[Route],
    extra_routes: &[Route],
    blue_green: bool,
) -> Result<Vec<Route>, RouteResolveError> {
    let mut routes = manifest_routes(package, infra_routes)?;

    if blue_green {
        if routes.is_empty() && extra_routes.is_empty() {
            return Err(RouteResolveError::EmptyBlueGreenRoutes);
        }
        routes = routes
            .iter()
            .map(|r| {
                let expanded = package.substitute(r.as_str());
                parse_route(&expanded)
            })
            .collect::<Result<Vec<_>, _>>()?;
    }

    routes.extend(extra_routes.iter().cloned());
    Ok(dedupe(routes))
}

/// Temporary (staging) routes for a blue/green setup.
///
/// A phase-level override wins over the infrastructure's temporary routes.
/// An empty result is legitimate here; the swap phase enforces non-emptiness
/// when it actually needs them.
pub fn resolve_temp_routes(phase_temp_routes: &[Route], infra_temp_routes: &[Route]) -> Vec<Route> {
    let chosen = if phase_temp_routes.is_empty() {
        infra_temp_routes
    } else {
        phase_temp_routes
    };
    dedupe(chosen.to_vec())
}

fn parse_route(value: &str) -> Result<Route, RouteResolveError> {
    Route::new(value).map_err(|source| RouteResolveError::InvalidRoute {
        value: value.to_string(),
        source,
    })
}

fn dedupe(routes: Vec<Route>) -> Vec<Route> {
    let mut seen = std::collections::HashSet::new();
    routes.into_iter().filter(|r| seen.insert(r.clone())).collect()
}
