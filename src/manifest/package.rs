// ABOUTME: Resolved manifest bundle and ((variable)) substitution.
// ABOUTME: Extracts application name, instance ceiling, and route entries.

use serde::{Deserialize, Serialize};
use serde_yaml::Value;

use super::{INSTANCE_PLACEHOLDER_TOKEN, LEGACY_NAME_PLACEHOLDER, ManifestError};

/// The resolved set of manifest files a phase operates on.
///
/// Exactly one application manifest, any number of variable files, and at
/// most one autoscaler manifest. Immutable once resolution finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestPackage {
    pub application_yml: String,
    pub variable_ymls: Vec<String>,
    pub autoscaler_yml: Option<String>,
}

impl ManifestPackage {
    /// The application's declared name, or `default_prefix` when the
    /// manifest leaves it blank or uses the legacy name placeholder.
    /// `((var))` references are substituted from the variable files.
    pub fn application_name(&self, default_prefix: &str) -> Result<String, ManifestError> {
        let app = self.application_entry()?;
        let name = match ci_get(&app, "name") {
            Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
            _ => return Ok(default_prefix.to_string()),
        };

        if name == LEGACY_NAME_PLACEHOLDER {
            return Ok(default_prefix.to_string());
        }

        if self.variable_ymls.is_empty() {
            return Ok(name);
        }

        Ok(self.substitute(&name))
    }

    /// The `instances:` ceiling from the manifest.
    ///
    /// Falls back to `fallback` when the field is absent, blank, or the
    /// deprecated instance placeholder. A `((var))` reference without any
    /// variable file to resolve it is a validation error.
    pub fn max_instance_count(&self, fallback: u32) -> Result<u32, ManifestError> {
        let app = self.application_entry()?;
        let raw = match ci_get(&app, "instances") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => return Ok(fallback),
        };

        let raw = raw.trim().to_string();
        if raw.is_empty() || raw == INSTANCE_PLACEHOLDER_TOKEN {
            return Ok(fallback);
        }

        let resolved = if raw.contains("((") && raw.contains("))") {
            if self.variable_ymls.is_empty() {
                return Err(ManifestError::NoVariableFiles);
            }
            self.substitute(&raw)
        } else {
            raw
        };

        resolved
            .parse::<u32>()
            .map_err(|_| ManifestError::InvalidInstanceCount(resolved))
    }

    /// The `routes:` entries of the application, verbatim, or `None` when
    /// the manifest declares no routes key.
    pub fn route_entries(&self) -> Result<Option<Vec<String>>, ManifestError> {
        let app = self.application_entry()?;
        let Some(value) = ci_get(&app, "routes") else {
            return Ok(None);
        };

        let Value::Sequence(entries) = value else {
            return Err(ManifestError::InvalidRouteFormat);
        };

        let mut routes = Vec::with_capacity(entries.len());
        for entry in entries {
            let Value::Mapping(map) = entry else {
                return Err(ManifestError::InvalidRouteFormat);
            };
            match ci_get(&map, "route") {
                Some(Value::String(s)) => routes.push(s.clone()),
                _ => return Err(ManifestError::InvalidRouteFormat),
            }
        }

        if routes.is_empty() {
            return Ok(None);
        }
        Ok(Some(routes))
    }

    /// Whether the application declares `no-route: true`.
    pub fn declares_no_route(&self) -> Result<bool, ManifestError> {
        let app = self.application_entry()?;
        Ok(matches!(ci_get(&app, "no-route"), Some(Value::Bool(true))))
    }

    /// Expand every `((name))` reference in `text`.
    ///
    /// Variable files are scanned in reverse declaration order; the first
    /// file containing the key wins (last-writer-wins by declared order).
    /// References no file defines are left untouched.
    pub fn substitute(&self, text: &str) -> String {
        let mut result = text.to_string();
        let mut cursor = 0;

        while let Some(start) = result[cursor..].find("((") {
            let start = cursor + start;
            let Some(end) = result[start..].find("))") else {
                break;
            };
            let end = start + end;
            let var_name = result[start + 2..end].to_string();

            match self.variable_value(&var_name) {
                Some(value) => {
                    result.replace_range(start..end + 2, &value);
                    cursor = start + value.len();
                }
                None => {
                    cursor = end + 2;
                }
            }
        }

        result
    }

    fn variable_value(&self, name: &str) -> Option<String> {
        for vars in self.variable_ymls.iter().rev() {
            let Ok(Value::Mapping(map)) = serde_yaml::from_str::<Value>(vars) else {
                continue;
            };
            if let Some(value) = map.get(Value::String(name.to_string())) {
                let rendered = scalar_to_string(value)?;
                if !rendered.trim().is_empty() {
                    return Some(rendered);
                }
            }
        }
        None
    }

    /// The first entry under `applications:` with case-insensitive keys.
    /// The first entry is always the application being deployed.
    fn application_entry(&self) -> Result<serde_yaml::Mapping, ManifestError> {
        let value: Value = serde_yaml::from_str(&self.application_yml)?;
        let Value::Mapping(root) = value else {
            return Err(ManifestError::NoApplicationEntry);
        };

        let apps = root
            .iter()
            .find(|(k, _)| matches!(k, Value::String(s) if s.eq_ignore_ascii_case("applications")))
            .map(|(_, v)| v);

        let Some(Value::Sequence(apps)) = apps else {
            return Err(ManifestError::NoApplicationEntry);
        };

        match apps.first() {
            Some(Value::Mapping(app)) => Ok(app.clone()),
            _ => Err(ManifestError::NoApplicationEntry),
        }
    }
}

fn ci_get<'a>(map: &'a serde_yaml::Mapping, key: &str) -> Option<&'a Value> {
    map.iter()
        .find(|(k, _)| matches!(k, Value::String(s) if s.eq_ignore_ascii_case(key)))
        .map(|(_, v)| v)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
