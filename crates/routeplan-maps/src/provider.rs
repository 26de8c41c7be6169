//! Mapping provider abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use routeplan_types::{GeocodedAddress, LegSummary, RouteAction, Waypoint};

use crate::MapsError;

/// Mapping provider trait
///
/// Abstracts geocoding, sequencing and routing so the orchestration layers
/// can run against HERE in production and fakes in tests.
#[async_trait]
pub trait MappingProvider: Send + Sync {
    /// Forward-geocode free text to its best match
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, MapsError>;

    /// Reverse-geocode a coordinate to an address label
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, MapsError>;

    /// Compute the visiting order for a fixed origin and destination
    async fn find_sequence(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        vias: &[Waypoint],
    ) -> Result<Vec<SequencedWaypoint>, MapsError>;

    /// Compute a detailed route through `ordered` waypoints, one section per leg
    async fn calculate_route(&self, ordered: &[Waypoint]) -> Result<Vec<RouteSection>, MapsError>;
}

/// A waypoint with its position in the computed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequencedWaypoint {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
    /// Zero-based visiting position
    pub sequence: u32,
}

/// Departure or arrival of a provider route section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectionEndpoint {
    #[serde(default)]
    pub place: serde_json::Value,
    #[serde(default)]
    pub time: Option<String>,
}

/// One provider route section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteSection {
    pub departure: SectionEndpoint,
    pub arrival: SectionEndpoint,
    #[serde(default)]
    pub summary: LegSummary,
    #[serde(default)]
    pub polyline: Option<String>,
    #[serde(default)]
    pub actions: Vec<RouteAction>,
}
