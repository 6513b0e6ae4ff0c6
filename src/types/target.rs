// ABOUTME: Target infrastructure coordinates and opaque credential handle.
// ABOUTME: Compared across phases to guard against cross-phase state borrowing.

use serde::{Deserialize, Serialize};

/// Where on the platform a deployment lands.
///
/// Organization and space may contain templating expressions; consumers
/// comparing two targets must render them first (see the snapshot
/// fallback reader).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfraTarget {
    pub endpoint: String,
    pub organization: String,
    pub space: String,
}

/// Opaque reference to stored platform credentials.
///
/// The orchestrator never sees secret material; the external worker
/// resolves the handle on its side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialHandle(String);

impl CredentialHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
