// ABOUTME: Crate-wide error type aggregating module errors.
// ABOUTME: Uses thiserror for ergonomic error handling.

use thiserror::Error;

use crate::dispatch::DispatchError;
use crate::manifest::ManifestError;
use crate::phase::PhaseError;
use crate::routes::RouteResolveError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Routes(#[from] RouteResolveError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error(transparent)]
    Phase(#[from] PhaseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
