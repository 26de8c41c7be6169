//! Identity errors

use thiserror::Error;

/// Identity provider errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// Invalid token (malformed, bad signature, wrong issuer or party)
    #[error("invalid token")]
    InvalidToken,

    /// Token has expired
    #[error("token expired")]
    TokenExpired,

    /// User not found
    #[error("user not found")]
    UserNotFound,

    /// Stored profile changed since it was read
    #[error("profile version conflict: expected {expected}, found {found}")]
    VersionConflict {
        /// Version the writer read
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Identity provider rejected or failed a call
    #[error("identity provider error: {0}")]
    Provider(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl IdentityError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidToken | Self::TokenExpired => 401,
            Self::UserNotFound => 404,
            Self::VersionConflict { .. } => 409,
            Self::Provider(_) | Self::Internal(_) => 500,
        }
    }

    /// Get error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidToken => "INVALID_TOKEN",
            Self::TokenExpired => "TOKEN_EXPIRED",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::VersionConflict { .. } => "VERSION_CONFLICT",
            Self::Provider(_) => "IDENTITY_PROVIDER_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::VersionConflict { .. })
    }
}
