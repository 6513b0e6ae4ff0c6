// ABOUTME: Validated route string for deployment units.
// ABOUTME: Routes are trimmed, non-empty hostnames with optional path suffix.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("route cannot be empty")]
    Empty,

    #[error("route cannot contain whitespace: '{0}'")]
    ContainsWhitespace(String),
}

/// One network route a deployment unit is (or will be) mapped to.
///
/// Routes are kept as opaque strings; the platform owns their grammar.
/// Only the obviously broken cases are rejected here.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Route(String);

impl Route {
    pub fn new(value: &str) -> Result<Self, RouteError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(RouteError::Empty);
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(RouteError::ContainsWhitespace(trimmed.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
