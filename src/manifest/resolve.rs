// ABOUTME: Override-level precedence resolution into a ManifestPackage.
// ABOUTME: Enforces single-manifest validation and accumulates variable files.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classify::{ManifestKind, classify};
use super::{ManifestError, ManifestPackage};

/// Where manifest files can be overridden, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OverrideLevel {
    /// Declared on the service itself.
    Service,
    /// Service-scoped override.
    ServiceOverride,
    /// Environment override applying to all services.
    EnvironmentGlobal,
    /// Environment override for this specific service; wins over all others.
    Environment,
}

impl fmt::Display for OverrideLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OverrideLevel::Service => "service",
            OverrideLevel::ServiceOverride => "service-override",
            OverrideLevel::EnvironmentGlobal => "environment-global",
            OverrideLevel::Environment => "environment",
        };
        write!(f, "{s}")
    }
}

/// How the files at one level were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// Stored inline with the workflow definition.
    Inline,
    /// Fetched from remote source control.
    Remote,
    /// Produced by a custom fetch script.
    Custom,
}

/// One candidate file, from any source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestFile {
    pub file_name: String,
    pub content: String,
}

/// All candidate files supplied at one override level.
#[derive(Debug, Clone)]
pub struct LevelFiles {
    pub level: OverrideLevel,
    pub source: SourceKind,
    pub files: Vec<ManifestFile>,
}

/// Resolve override levels into a single manifest package.
///
/// Variable manifests accumulate across every level in declaration order;
/// application and autoscaler manifests come from the highest-precedence
/// level that declares any. With single-manifest enforcement, ambiguity at
/// that level fails loudly instead of silently picking one.
pub fn resolve(
    levels: &[LevelFiles],
    enforce_single_manifest: bool,
) -> Result<ManifestPackage, ManifestError> {
    let mut variable_ymls = Vec::new();
    let mut apps_by_level: Vec<(OverrideLevel, Vec<&ManifestFile>)> = Vec::new();
    let mut autoscalers_by_level: Vec<(OverrideLevel, Vec<&ManifestFile>)> = Vec::new();

    for level in levels {
        let mut classified_any = false;
        let mut apps = Vec::new();
        let mut autoscalers = Vec::new();

        for file in &level.files {
            match classify(&file.content) {
                ManifestKind::Application => {
                    classified_any = true;
                    apps.push(file);
                }
                ManifestKind::Autoscaler => {
                    classified_any = true;
                    autoscalers.push(file);
                }
                ManifestKind::Variable => {
                    classified_any = true;
                    variable_ymls.push(file.content.clone());
                }
                ManifestKind::Unrecognized => {
                    debug!(file = %file.file_name, level = %level.level, "ignoring unrecognized file");
                }
            }
        }

        if level.source == SourceKind::Inline && !level.files.is_empty() && !classified_any {
            return Err(ManifestError::NoManifestAtLevel(level.level));
        }

        if !apps.is_empty() {
            apps_by_level.push((level.level, apps));
        }
        if !autoscalers.is_empty() {
            autoscalers_by_level.push((level.level, autoscalers));
        }
    }

    let application_yml = pick_single(
        &mut apps_by_level,
        enforce_single_manifest,
        ManifestError::MultipleApplicationManifests,
    )?
    .ok_or(ManifestError::MissingApplicationManifest)?;

    let autoscaler_yml = pick_single(
        &mut autoscalers_by_level,
        enforce_single_manifest,
        ManifestError::MultipleAutoscalerManifests,
    )?;

    Ok(ManifestPackage {
        application_yml,
        variable_ymls,
        autoscaler_yml,
    })
}

/// Take the winning file of one kind: highest-precedence level with any
/// candidates; within that level, exactly one under enforcement, last
/// declared otherwise.
fn pick_single(
    by_level: &mut [(OverrideLevel, Vec<&ManifestFile>)],
    enforce_single_manifest: bool,
    ambiguity: fn(OverrideLevel) -> ManifestError,
) -> Result<Option<String>, ManifestError> {
    by_level.sort_by_key(|(level, _)| *level);

    let Some((level, candidates)) = by_level.last() else {
        return Ok(None);
    };

    if enforce_single_manifest && candidates.len() > 1 {
        return Err(ambiguity(*level));
    }

    Ok(candidates.last().map(|file| file.content.clone()))
}

/// Reject fetched file sets carrying duplicate application or autoscaler
/// manifests. Applied to remote and custom fetch results, which bypass the
/// per-level bookkeeping above.
pub fn check_duplicates(files: &[ManifestFile]) -> Result<(), ManifestError> {
    let mut apps = 0;
    let mut autoscalers = 0;
    for file in files {
        match classify(&file.content) {
            ManifestKind::Application => apps += 1,
            ManifestKind::Autoscaler => autoscalers += 1,
            _ => {}
        }
    }
    if apps > 1 {
        return Err(ManifestError::DuplicateManifest(ManifestKind::Application));
    }
    if autoscalers > 1 {
        return Err(ManifestError::DuplicateManifest(ManifestKind::Autoscaler));
    }
    Ok(())
}

/// Drop comment lines from a custom fetch script before execution.
pub fn strip_comment_lines(script: &str) -> String {
    script
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter(|line| !line.starts_with('#'))
        .collect::<Vec<_>>()
        .join("\n")
}
