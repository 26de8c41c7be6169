//! Model errors

use thiserror::Error;

/// Errors raised while constructing or decoding domain values
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// User id failed validation
    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    /// Plan catalog could not be parsed
    #[error("invalid plan catalog: {0}")]
    InvalidCatalog(String),

    /// Stored profile metadata could not be decoded
    #[error("invalid profile metadata: {0}")]
    InvalidProfile(String),
}
