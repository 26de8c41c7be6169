//! Route optimization
//!
//! Two provider calls in strict order: the sequencing call decides the
//! visiting order, then the routing call computes the legs for that order.
//! Legs are matched back to waypoints by position, so the section count must
//! be exactly one less than the waypoint count.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, instrument};

use routeplan_types::{LegEndpoint, OptimizedRoute, RouteLeg, Waypoint};

use crate::error::MapsError;
use crate::provider::{MappingProvider, RouteSection};

/// Sequencing-then-routing orchestrator
#[derive(Clone)]
pub struct RouteOptimizer {
    provider: Arc<dyn MappingProvider>,
}

impl std::fmt::Debug for RouteOptimizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteOptimizer").finish_non_exhaustive()
    }
}

impl RouteOptimizer {
    pub fn new(provider: Arc<dyn MappingProvider>) -> Self {
        Self { provider }
    }

    /// Find the best visiting order and the detailed route through it.
    #[instrument(skip_all, fields(vias = vias.len()))]
    pub async fn optimize(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        vias: &[Waypoint],
    ) -> Result<OptimizedRoute, MapsError> {
        let ids = validate_waypoints(origin, destination, vias)?;

        let mut sequenced = self
            .provider
            .find_sequence(origin, destination, vias)
            .await?;

        let expected = vias.len() + 2;
        if sequenced.len() != expected {
            return Err(MapsError::SequencingFailed(format!(
                "expected {expected} waypoints in sequence, got {}",
                sequenced.len()
            )));
        }
        let returned: HashSet<&str> = sequenced.iter().map(|w| w.id.as_str()).collect();
        if returned != ids {
            return Err(MapsError::SequencingFailed(
                "sequence does not match the requested waypoints".to_string(),
            ));
        }

        sequenced.sort_by_key(|w| w.sequence);
        let ordered: Vec<Waypoint> = sequenced
            .into_iter()
            .map(|w| Waypoint::new(w.id, w.lat, w.lng))
            .collect();

        let sections = self.provider.calculate_route(&ordered).await?;
        if sections.len() != ordered.len() - 1 {
            return Err(MapsError::RoutingFailed(format!(
                "expected {} route sections, got {}",
                ordered.len() - 1,
                sections.len()
            )));
        }

        let legs: Vec<RouteLeg> = sections
            .into_iter()
            .zip(ordered.windows(2))
            .map(|(section, pair)| build_leg(section, &pair[0], &pair[1]))
            .collect();

        let total_duration_seconds: u64 = legs.iter().map(|l| l.summary.duration).sum();
        let total_length_meters: u64 = legs.iter().map(|l| l.summary.length).sum();

        info!(
            waypoints = ordered.len(),
            total_duration_seconds, total_length_meters, "Route optimized"
        );

        Ok(OptimizedRoute {
            ordered_waypoints: ordered,
            legs,
            total_duration_seconds,
            total_length_meters,
        })
    }
}

fn build_leg(section: RouteSection, from: &Waypoint, to: &Waypoint) -> RouteLeg {
    RouteLeg {
        departure: LegEndpoint {
            place: section.departure.place,
            time: section.departure.time,
            original_id: from.id.clone(),
        },
        arrival: LegEndpoint {
            place: section.arrival.place,
            time: section.arrival.time,
            original_id: to.id.clone(),
        },
        summary: section.summary,
        polyline: section.polyline,
        actions: section.actions,
    }
}

/// Check ids and coordinates; returns the id set
///
/// Ids must be non-empty, unique across the whole request and free of `;`,
/// which the sequencing API uses as a field separator.
pub fn validate_waypoints<'a>(
    origin: &'a Waypoint,
    destination: &'a Waypoint,
    vias: &'a [Waypoint],
) -> Result<HashSet<&'a str>, MapsError> {
    let mut ids = HashSet::with_capacity(vias.len() + 2);
    for waypoint in std::iter::once(origin)
        .chain(std::iter::once(destination))
        .chain(vias.iter())
    {
        if waypoint.id.trim().is_empty() {
            return Err(MapsError::InvalidInput(
                "waypoint ids must be non-empty".to_string(),
            ));
        }
        if waypoint.id.contains(';') {
            return Err(MapsError::InvalidInput(format!(
                "waypoint id '{}' must not contain ';'",
                waypoint.id
            )));
        }
        if !waypoint.has_valid_coordinates() {
            return Err(MapsError::InvalidInput(format!(
                "waypoint '{}' has invalid coordinates",
                waypoint.id
            )));
        }
        if !ids.insert(waypoint.id.as_str()) {
            return Err(MapsError::InvalidInput(format!(
                "duplicate waypoint id '{}'",
                waypoint.id
            )));
        }
    }
    Ok(ids)
}
