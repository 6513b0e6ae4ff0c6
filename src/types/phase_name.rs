// ABOUTME: Workflow phase name used as part of snapshot keys.
// ABOUTME: Trimmed on construction so key lookups never miss on whitespace.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PhaseNameError {
    #[error("phase name cannot be empty")]
    Empty,
}

/// The declared name of one workflow phase.
///
/// Snapshot keys embed the phase name, and the workflow authoring surface
/// is notorious for trailing whitespace, so names are trimmed up front.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PhaseName(String);

impl PhaseName {
    pub fn new(value: &str) -> Result<Self, PhaseNameError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(PhaseNameError::Empty);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PhaseName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_whitespace() {
        let name = PhaseName::new(" Phase 1 ").unwrap();
        assert_eq!(name.as_str(), "Phase 1");
    }

    #[test]
    fn rejects_blank() {
        assert!(PhaseName::new("  ").is_err());
    }
}
