// ABOUTME: Validated application name with platform normalization rules.
// ABOUTME: Replaces characters the platform rejects unless special chars are allowed.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppNameError {
    #[error("application name cannot be empty")]
    Empty,

    #[error("application name cannot be only whitespace")]
    Blank,
}

/// The name of a deployment unit on the target platform.
///
/// Platform application names historically allowed only alphanumerics,
/// hyphens, and underscores. `normalized` replaces anything else with a
/// hyphen; accounts with the special-characters flag enabled keep the name
/// verbatim via `verbatim`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    /// Keep the name exactly as given.
    pub fn verbatim(value: &str) -> Result<Self, AppNameError> {
        if value.is_empty() {
            return Err(AppNameError::Empty);
        }
        if value.trim().is_empty() {
            return Err(AppNameError::Blank);
        }
        Ok(Self(value.to_string()))
    }

    /// Normalize the name to the platform's conservative character set.
    pub fn normalized(value: &str) -> Result<Self, AppNameError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(AppNameError::Empty);
        }
        let cleaned: String = trimmed
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();
        Ok(Self(cleaned))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_replaces_invalid_chars() {
        let name = AppName::normalized("my app/v2").unwrap();
        assert_eq!(name.as_str(), "my-app-v2");
    }

    #[test]
    fn verbatim_keeps_special_chars() {
        let name = AppName::verbatim("my app/v2").unwrap();
        assert_eq!(name.as_str(), "my app/v2");
    }

    #[test]
    fn empty_name_rejected() {
        assert!(AppName::verbatim("").is_err());
        assert!(AppName::normalized("   ").is_err());
    }
}
