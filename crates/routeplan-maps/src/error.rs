//! Maps errors

use thiserror::Error;

/// Geocoding and routing errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MapsError {
    /// Caller supplied unusable input
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Provider answered but found nothing
    #[error("no results found for {0}")]
    NotFound(String),

    /// Provider returned a non-success status
    #[error("mapping provider error ({status}): {message}")]
    Provider {
        /// HTTP status from the provider
        status: u16,
        /// Provider-supplied detail
        message: String,
    },

    /// Waypoint sequencing call failed or returned an unusable result
    #[error("failed to optimize waypoint sequence: {0}")]
    SequencingFailed(String),

    /// Routing call failed or returned an unusable result
    #[error("failed to calculate route: {0}")]
    RoutingFailed(String),

    /// Network, timeout or decoding failure
    #[error("unexpected mapping error: {0}")]
    Unexpected(String),
}

impl MapsError {
    /// Whether the caller is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
