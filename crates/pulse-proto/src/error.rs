//! Error types for protocol values.

use thiserror::Error;

/// Errors raised while validating or decoding protocol values.
#[derive(Debug, Error)]
pub enum ProtoError {
    /// A value failed validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown container action.
    #[error("invalid action: {0}, must be start, stop, or restart")]
    InvalidAction(String),

    /// JSON encoding or decoding failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
