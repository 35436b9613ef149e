//! Error types for state encoding.

use thiserror::Error;

/// Errors raised while turning a state tree into (or back from) its wire form.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Non-representable scalar at `{0}`")]
    NonRepresentable(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EncodeError {
    fn from(err: serde_json::Error) -> Self {
        EncodeError::SerializationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, EncodeError>;
