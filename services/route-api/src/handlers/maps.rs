//! Geocoding handlers

use std::collections::BTreeMap;
use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use routeplan_types::GeocodedAddress;

use crate::error::{ApiError, ApiResult};
use crate::handlers::shared::{json_body, record_op_duration, validate_coordinates};
use crate::state::AppState;

/// Largest batch accepted in one request.
///
/// Batches run in paced groups; anything much larger would outlast the
/// request timeout and lose every finished lookup.
pub const MAX_BATCH_ADDRESSES: usize = 250;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct GeocodeRequest {
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct BatchGeocodeRequest {
    pub addresses: Vec<String>,
}

/// One batch outcome: the geocoded address, or why it failed
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum BatchEntry {
    Found(GeocodedAddress),
    Failed { error: String },
}

#[derive(Debug, Serialize)]
pub struct BatchGeocodeResponse {
    pub results: BTreeMap<String, BatchEntry>,
}

#[derive(Debug, Deserialize)]
pub struct ReverseGeocodeRequest {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Serialize)]
pub struct ReverseGeocodeResponse {
    pub address: String,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /geocode
#[instrument(skip_all)]
pub async fn geocode(
    State(state): State<AppState>,
    payload: Result<Json<GeocodeRequest>, JsonRejection>,
) -> ApiResult<Json<GeocodedAddress>> {
    let start = Instant::now();
    let maps = state.maps()?;
    let req = json_body(payload)?;

    if req.address.trim().is_empty() {
        return Err(ApiError::Validation(
            "Invalid address provided. It must be a non-empty string.".to_string(),
        ));
    }

    let result = maps.geocoder.geocode(&req.address).await;
    record_op_duration("geocode", start, result.is_ok());

    Ok(Json(result?))
}

/// POST /batch-geocode
#[instrument(skip_all)]
pub async fn batch_geocode(
    State(state): State<AppState>,
    payload: Result<Json<BatchGeocodeRequest>, JsonRejection>,
) -> ApiResult<Json<BatchGeocodeResponse>> {
    let start = Instant::now();
    let maps = state.maps()?;
    let req = json_body(payload)?;

    if req.addresses.is_empty() {
        return Err(ApiError::Validation(
            "Invalid addresses provided. Expected a non-empty array of address strings."
                .to_string(),
        ));
    }
    if req.addresses.len() > MAX_BATCH_ADDRESSES {
        return Err(ApiError::Validation(format!(
            "Too many addresses provided ({}). At most {MAX_BATCH_ADDRESSES} are allowed per batch.",
            req.addresses.len()
        )));
    }
    if req.addresses.iter().all(|a| a.trim().is_empty()) {
        return Err(ApiError::Validation(
            "No valid addresses provided after filtering.".to_string(),
        ));
    }

    let outcomes = maps.batch.geocode_batch(&req.addresses).await;
    let failed = outcomes.values().filter(|r| r.is_err()).count();
    tracing::info!(
        total = outcomes.len(),
        failed = failed,
        "Batch geocode complete"
    );
    record_op_duration("batch_geocode", start, true);

    let results = outcomes
        .into_iter()
        .map(|(address, outcome)| {
            let entry = match outcome {
                Ok(found) => BatchEntry::Found(found),
                Err(e) => BatchEntry::Failed {
                    error: e.to_string(),
                },
            };
            (address, entry)
        })
        .collect();

    Ok(Json(BatchGeocodeResponse { results }))
}

/// POST /reverse-geocode
#[instrument(skip_all)]
pub async fn reverse_geocode(
    State(state): State<AppState>,
    payload: Result<Json<ReverseGeocodeRequest>, JsonRejection>,
) -> ApiResult<Json<ReverseGeocodeResponse>> {
    let start = Instant::now();
    let maps = state.maps()?;
    let req = json_body(payload)?;
    validate_coordinates(req.lat, req.lng)?;

    let result = maps.geocoder.reverse_geocode(req.lat, req.lng).await;
    record_op_duration("reverse_geocode", start, result.is_ok());

    Ok(Json(ReverseGeocodeResponse { address: result? }))
}
