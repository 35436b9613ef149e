//! Error types for the state store.

use rolesync_hub::HubError;
use thiserror::Error;

/// Errors that can occur in state store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("State store is closed")]
    Closed,

    #[error("Transport error: {0}")]
    Transport(#[from] HubError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
