//! Shared fakes for routeplan-maps integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use routeplan_maps::{
    normalize_address, MapsError, MappingProvider, RouteSection, SectionEndpoint,
    SequencedWaypoint,
};
use routeplan_types::{GeocodedAddress, LegSummary, RouteAction, Waypoint};

/// In-memory provider with call counters
#[derive(Default)]
pub struct FakeMappingProvider {
    known: HashMap<String, GeocodedAddress>,
    sequence: Option<Vec<(String, u32)>>,
    sequence_error: Option<MapsError>,
    section_count: Option<usize>,
    pub geocode_calls: AtomicUsize,
    pub sequence_calls: AtomicUsize,
    pub route_calls: AtomicUsize,
}

impl FakeMappingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `address` resolvable
    pub fn with_address(mut self, address: &str, lat: f64, lng: f64) -> Self {
        self.known.insert(
            normalize_address(address),
            GeocodedAddress {
                lat,
                lng,
                address: format!("{}, Canonical", address.trim()),
            },
        );
        self
    }

    /// Fix the visiting order as `(id, sequence)` pairs
    pub fn with_sequence(mut self, order: &[(&str, u32)]) -> Self {
        self.sequence = Some(order.iter().map(|(id, s)| (id.to_string(), *s)).collect());
        self
    }

    pub fn with_sequence_error(mut self, error: MapsError) -> Self {
        self.sequence_error = Some(error);
        self
    }

    /// Return this many sections regardless of the waypoint count
    pub fn with_section_count(mut self, count: usize) -> Self {
        self.section_count = Some(count);
        self
    }

    pub fn geocode_calls(&self) -> usize {
        self.geocode_calls.load(Ordering::SeqCst)
    }

    pub fn route_calls(&self) -> usize {
        self.route_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MappingProvider for FakeMappingProvider {
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, MapsError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        self.known
            .get(&normalize_address(address))
            .cloned()
            .ok_or_else(|| MapsError::NotFound(address.to_string()))
    }

    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, MapsError> {
        Ok(format!("Somewhere near {lat},{lng}"))
    }

    async fn find_sequence(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        vias: &[Waypoint],
    ) -> Result<Vec<SequencedWaypoint>, MapsError> {
        self.sequence_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = &self.sequence_error {
            return Err(error.clone());
        }

        let all: Vec<&Waypoint> = std::iter::once(origin)
            .chain(vias.iter())
            .chain(std::iter::once(destination))
            .collect();

        let order: Vec<(String, u32)> = match &self.sequence {
            Some(order) => order.clone(),
            None => {
                // Origin first, vias in input order, destination last
                let n = u32::try_from(all.len()).unwrap();
                all.iter()
                    .zip(0..n)
                    .map(|(w, s)| (w.id.clone(), s))
                    .collect()
            }
        };

        Ok(order
            .into_iter()
            .filter_map(|(id, sequence)| {
                all.iter().find(|w| w.id == id).map(|w| SequencedWaypoint {
                    id: w.id.clone(),
                    lat: w.lat,
                    lng: w.lng,
                    sequence,
                })
            })
            .collect())
    }

    async fn calculate_route(&self, ordered: &[Waypoint]) -> Result<Vec<RouteSection>, MapsError> {
        self.route_calls.fetch_add(1, Ordering::SeqCst);
        let count = self.section_count.unwrap_or(ordered.len() - 1);
        Ok((0..count)
            .map(|i| {
                let leg = u64::try_from(i + 1).unwrap();
                RouteSection {
                    departure: SectionEndpoint {
                        place: serde_json::json!({"type": "place", "index": i}),
                        time: Some("2026-01-01T08:00:00Z".to_string()),
                    },
                    arrival: SectionEndpoint {
                        place: serde_json::json!({"type": "place", "index": i + 1}),
                        time: None,
                    },
                    summary: LegSummary {
                        duration: 60 * leg,
                        length: 1_000 * leg,
                    },
                    polyline: Some(format!("poly-{i}")),
                    actions: vec![RouteAction {
                        instruction: Some("Head north".to_string()),
                        duration: 60 * leg,
                        length: 1_000 * leg,
                    }],
                }
            })
            .collect())
    }
}
