//! Waypoint and route types

use serde::{Deserialize, Serialize};

/// A stop with a caller-assigned id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub id: String,
    pub lat: f64,
    pub lng: f64,
}

impl Waypoint {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            lat,
            lng,
        }
    }

    /// Finite and within WGS84 bounds
    pub fn has_valid_coordinates(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }

    /// `lat,lng` as expected by routing query strings
    pub fn coordinates(&self) -> String {
        format!("{},{}", self.lat, self.lng)
    }
}

/// Result of forward geocoding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeocodedAddress {
    pub lat: f64,
    pub lng: f64,
    /// Canonical label returned by the provider
    pub address: String,
}

/// One end of a route leg
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegEndpoint {
    /// Provider place object, passed through untouched
    pub place: serde_json::Value,
    pub time: Option<String>,
    /// Id of the waypoint this end corresponds to
    pub original_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegSummary {
    /// Seconds
    pub duration: u64,
    /// Meters
    pub length: u64,
}

/// Turn-by-turn instruction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteAction {
    #[serde(default)]
    pub instruction: Option<String>,
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub length: u64,
}

/// Path between two consecutive ordered waypoints
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteLeg {
    pub departure: LegEndpoint,
    pub arrival: LegEndpoint,
    pub summary: LegSummary,
    /// Flexible-polyline encoded geometry
    pub polyline: Option<String>,
    pub actions: Vec<RouteAction>,
}

/// Result of a route optimization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRoute {
    #[serde(rename = "optimizedWaypointDetails")]
    pub ordered_waypoints: Vec<Waypoint>,
    #[serde(rename = "routeSections")]
    pub legs: Vec<RouteLeg>,
    #[serde(rename = "totalDuration")]
    pub total_duration_seconds: u64,
    #[serde(rename = "totalLength")]
    pub total_length_meters: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Waypoint::new("a", 52.52, 13.405).has_valid_coordinates());
        assert!(Waypoint::new("a", -90.0, 180.0).has_valid_coordinates());
        assert!(!Waypoint::new("a", 91.0, 0.0).has_valid_coordinates());
        assert!(!Waypoint::new("a", 0.0, -180.5).has_valid_coordinates());
        assert!(!Waypoint::new("a", f64::NAN, 0.0).has_valid_coordinates());
    }

    #[test]
    fn test_optimized_route_wire_names() {
        let route = OptimizedRoute {
            ordered_waypoints: vec![Waypoint::new("origin", 1.0, 2.0)],
            legs: vec![],
            total_duration_seconds: 10,
            total_length_meters: 20,
        };
        let json = serde_json::to_value(&route).unwrap();
        assert!(json.get("optimizedWaypointDetails").is_some());
        assert!(json.get("routeSections").is_some());
        assert_eq!(json["totalDuration"], 10);
        assert_eq!(json["totalLength"], 20);
    }
}
