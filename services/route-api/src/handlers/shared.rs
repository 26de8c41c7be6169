//! Shared handler utilities

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::ApiError;

// ============================================================================
// Input Validation
// ============================================================================

/// Unwrap a JSON body, turning axum's rejection into our error body.
pub fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Rejected request body");
            Err(ApiError::Validation(format!(
                "Invalid request body: {}",
                rejection.body_text()
            )))
        }
    }
}

/// Latitude and longitude are finite and within WGS84 bounds
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), ApiError> {
    if !lat.is_finite() || !lng.is_finite() {
        return Err(ApiError::Validation(
            "Latitude and longitude are required.".to_string(),
        ));
    }
    if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lng) {
        return Err(ApiError::Validation(
            "Latitude must be within [-90, 90] and longitude within [-180, 180].".to_string(),
        ));
    }
    Ok(())
}

// ============================================================================
// Metrics Helpers
// ============================================================================

/// Record operation duration with result label.
///
/// Labels: operation, result (ok/err)
#[inline]
pub fn record_op_duration(operation: &'static str, start: Instant, success: bool) {
    let result = if success { "ok" } else { "err" };
    metrics::histogram!(
        "routeplan_operation_duration_seconds",
        "operation" => operation,
        "result" => result
    )
    .record(start.elapsed().as_secs_f64());
}
