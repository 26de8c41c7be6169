//! Route optimization handler

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use tracing::instrument;

use routeplan_maps::validate_waypoints;
use routeplan_types::{OptimizedRoute, Waypoint};

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::handlers::shared::{json_body, record_op_duration, validate_coordinates};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WaypointInput {
    #[serde(default)]
    pub id: Option<String>,
    pub lat: f64,
    pub lng: f64,
}

impl WaypointInput {
    fn into_waypoint(self, default_id: impl FnOnce() -> String) -> Waypoint {
        let id = self
            .id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(default_id);
        Waypoint::new(id, self.lat, self.lng)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRouteRequest {
    pub origin: WaypointInput,
    pub destination: WaypointInput,
    #[serde(default)]
    pub via_stops: Option<Vec<WaypointInput>>,
}

/// POST /optimize-route
///
/// Waypoints are validated before plan limits are checked, so malformed
/// input never costs an optimization. One optimization is counted before any
/// provider call is made.
#[instrument(skip_all, fields(user_id = %user.as_str()))]
pub async fn optimize_route(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<OptimizeRouteRequest>, JsonRejection>,
) -> ApiResult<Json<OptimizedRoute>> {
    let start = Instant::now();
    let maps = state.maps()?;
    let req = json_body(payload)?;

    let origin = req.origin.into_waypoint(|| "origin".to_string());
    let destination = req.destination.into_waypoint(|| "destination".to_string());
    let vias: Vec<Waypoint> = req
        .via_stops
        .unwrap_or_default()
        .into_iter()
        .enumerate()
        .map(|(i, via)| via.into_waypoint(|| format!("via-{i}")))
        .collect();

    for (label, waypoint) in [("origin", &origin), ("destination", &destination)] {
        validate_coordinates(waypoint.lat, waypoint.lng).map_err(|_| {
            ApiError::Validation(format!(
                "Invalid {label} provided. It must be an object with lat and lng numbers."
            ))
        })?;
    }
    for via in &vias {
        validate_coordinates(via.lat, via.lng).map_err(|_| {
            ApiError::Validation(
                "Invalid via waypoint. Each must have lat and lng numbers.".to_string(),
            )
        })?;
    }
    validate_waypoints(&origin, &destination, &vias)?;

    let admission = match state.billing.admit_optimization(&user, vias.len()).await {
        Ok(admission) => admission,
        Err(e) => {
            metrics::counter!("routeplan_optimizations_total", "result" => "rejected")
                .increment(1);
            return Err(e.into());
        }
    };
    tracing::debug!(plan = %admission.plan, used = admission.optimizations_used, "Optimization admitted");

    let result = maps.optimizer.optimize(&origin, &destination, &vias).await;
    record_op_duration("optimize_route", start, result.is_ok());

    let outcome = if result.is_ok() { "ok" } else { "failed" };
    metrics::counter!("routeplan_optimizations_total", "result" => outcome).increment(1);

    let route = result?;
    tracing::info!(
        stops = route.ordered_waypoints.len(),
        duration_s = route.total_duration_seconds,
        length_m = route.total_length_meters,
        "Route optimized"
    );
    Ok(Json(route))
}
