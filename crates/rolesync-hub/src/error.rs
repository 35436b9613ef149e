//! Error types for the hub.

use thiserror::Error;

/// Errors returned by hub operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    #[error("Hub is closed")]
    Closed,
}

pub type Result<T> = std::result::Result<T, HubError>;
