// ABOUTME: Type-safe identifiers and validated domain types.
// ABOUTME: Uses phantom types to prevent ID confusion at compile time.

mod app_name;
mod id;
mod phase_name;
mod route;
mod target;

pub use app_name::{AppName, AppNameError};
pub use id::{AccountId, ActivityId, CorrelationId, ExecutionId, ServiceId};
pub use phase_name::{PhaseName, PhaseNameError};
pub use route::{Route, RouteError};
pub use target::{CredentialHandle, InfraTarget};
