// ABOUTME: Phased application rollout orchestration for cloud platforms.
// ABOUTME: Pure input resolution plus an async dispatch/resume state machine.

//! Klimaka drives blue/green application rollouts as a sequence of phases:
//! setup (create the new version), resize (shift instance counts), and
//! route swap (the traffic cutover), each with a rollback counterpart.
//!
//! The orchestrator never talks to the platform itself. It resolves phase
//! inputs, hands one command at a time to an injected [`dispatch::TaskDispatcher`],
//! suspends, and finalizes when the result comes back via
//! [`phase::Orchestrator::resume`]. Completed phases leave an immutable
//! [`snapshot::PhaseSnapshot`] behind for downstream phases and rollbacks.

pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod manifest;
pub mod phase;
pub mod resize;
pub mod routes;
pub mod snapshot;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod unit;

pub use error::{Error, Result};
