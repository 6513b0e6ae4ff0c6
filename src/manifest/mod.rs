// ABOUTME: Manifest gathering, classification, and variable substitution.
// ABOUTME: Turns override-level file sets into a validated ManifestPackage.

mod classify;
mod package;
mod resolve;

pub use classify::{ManifestKind, classify};
pub use package::ManifestPackage;
pub use resolve::{
    LevelFiles, ManifestFile, OverrideLevel, SourceKind, check_duplicates, resolve,
    strip_comment_lines,
};

use thiserror::Error;

/// Deprecated placeholder telling the resolver to use infrastructure routes.
pub const ROUTE_PLACEHOLDER_TOKEN: &str = "${ROUTE_MAP}";
/// Deprecated placeholder telling the resolver to use the configured count.
pub const INSTANCE_PLACEHOLDER_TOKEN: &str = "${INSTANCE_COUNT}";
/// Legacy name placeholder; resolves to the computed application prefix.
pub const LEGACY_NAME_PLACEHOLDER: &str = "${APPLICATION_NAME}";

/// Validation failures during manifest resolution. All of these abort the
/// phase before any remote dispatch.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("no recognizable manifest file found at the {0} override level")]
    NoManifestAtLevel(OverrideLevel),

    #[error("multiple application manifests found at the {0} override level")]
    MultipleApplicationManifests(OverrideLevel),

    #[error("multiple autoscaler manifests found at the {0} override level")]
    MultipleAutoscalerManifests(OverrideLevel),

    #[error("no application manifest found after override resolution")]
    MissingApplicationManifest,

    #[error("found more than one {0} manifest in fetched files")]
    DuplicateManifest(ManifestKind),

    #[error("manifest contains no application entry")]
    NoApplicationEntry,

    #[error("invalid route format in manifest")]
    InvalidRouteFormat,

    #[error("invalid instance count in manifest: '{0}'")]
    InvalidInstanceCount(String),

    #[error("no valid variable file found, verify a variable file is present and well-formed")]
    NoVariableFiles,

    #[error("manifest YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
