// ABOUTME: Content-based classification of candidate manifest files.
// ABOUTME: Distinguishes application, autoscaler, and variable manifests.

use serde_yaml::Value;
use std::fmt;

/// What a candidate file turned out to be after content inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ManifestKind {
    /// Declares the application (`applications:` key).
    Application,
    /// Declares autoscaler rules (`instance_limits:` and `rules:` keys).
    Autoscaler,
    /// Any other well-formed YAML mapping; eligible as a substitution source.
    Variable,
    /// Not YAML, or not a mapping; ignored by resolution.
    Unrecognized,
}

impl fmt::Display for ManifestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ManifestKind::Application => "application",
            ManifestKind::Autoscaler => "autoscaler",
            ManifestKind::Variable => "variable",
            ManifestKind::Unrecognized => "unrecognized",
        };
        write!(f, "{s}")
    }
}

/// Classify a file by inspecting its content, never its name.
pub fn classify(content: &str) -> ManifestKind {
    let Ok(value) = serde_yaml::from_str::<Value>(content) else {
        return ManifestKind::Unrecognized;
    };

    let Value::Mapping(map) = value else {
        return ManifestKind::Unrecognized;
    };

    if map.is_empty() {
        return ManifestKind::Unrecognized;
    }

    if has_key(&map, "applications") {
        return ManifestKind::Application;
    }

    if has_key(&map, "instance_limits") && has_key(&map, "rules") {
        return ManifestKind::Autoscaler;
    }

    ManifestKind::Variable
}

fn has_key(map: &serde_yaml::Mapping, key: &str) -> bool {
    map.keys()
        .any(|k| matches!(k, Value::String(s) if s.eq_ignore_ascii_case(key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn application_manifest_detected() {
        let yml = "applications:\n- name: orders\n  instances: 2\n";
        assert_eq!(classify(yml), ManifestKind::Application);
    }

    #[test]
    fn autoscaler_manifest_detected() {
        let yml = "instance_limits:\n  min: 1\n  max: 4\nrules:\n- rule_type: cpu\n";
        assert_eq!(classify(yml), ManifestKind::Autoscaler);
    }

    #[test]
    fn variable_manifest_detected() {
        let yml = "APP_NAME: orders\nINSTANCES: 3\n";
        assert_eq!(classify(yml), ManifestKind::Variable);
    }

    #[test]
    fn instance_limits_alone_is_variable() {
        // Both autoscaler keys are required; one alone is just variables.
        let yml = "instance_limits:\n  min: 1\n";
        assert_eq!(classify(yml), ManifestKind::Variable);
    }

    #[test]
    fn garbage_is_unrecognized() {
        assert_eq!(classify("{{{{"), ManifestKind::Unrecognized);
        assert_eq!(classify("- a\n- b\n"), ManifestKind::Unrecognized);
        assert_eq!(classify(""), ManifestKind::Unrecognized);
    }
}
