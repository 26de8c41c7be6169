//! Health check handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub maps: &'static str,
    pub geocode_cache_entries: u64,
}

/// Liveness probe - always returns OK if the service is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness probe - the maps provider must be configured
pub async fn ready(State(state): State<AppState>) -> Result<Json<ReadyResponse>, StatusCode> {
    match state.maps.as_deref() {
        Some(maps) => Ok(Json(ReadyResponse {
            status: "ready",
            maps: "configured",
            geocode_cache_entries: maps.geocoder.cache().entry_count(),
        })),
        None => {
            tracing::warn!("Readiness check failed: HERE_API_KEY missing");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
