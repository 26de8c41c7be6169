//! HERE API client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error, instrument, warn};

use routeplan_types::{GeocodedAddress, Waypoint};

use crate::config::MapsConfig;
use crate::error::MapsError;
use crate::provider::{MappingProvider, RouteSection, SequencedWaypoint};

/// HERE mapping provider
#[derive(Clone)]
pub struct HereClient {
    client: Client,
    config: MapsConfig,
}

impl std::fmt::Debug for HereClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HereClient")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Raw status and body of a HERE call
struct HereResponse {
    status: StatusCode,
    body: serde_json::Value,
}

impl HereResponse {
    /// First non-empty string among `fields`, else the HTTP status line
    fn detail(&self, fields: &[&str]) -> String {
        fields
            .iter()
            .find_map(|field| match self.body.get(*field) {
                Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
                Some(serde_json::Value::Null) | None => None,
                Some(other) => Some(other.to_string()),
            })
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }

    fn parse<T: DeserializeOwned>(self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.body)
    }
}

impl HereClient {
    /// Create a new HERE client
    pub fn new(config: MapsConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// GET `url` with `params` plus the API key.
    ///
    /// Only transport failures are errors here; status handling is left to
    /// each endpoint because HERE reports details differently per API.
    async fn here_get(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> Result<HereResponse, MapsError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .query(&[("apiKey", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| {
                error!(error = %e, "HERE API request failed");
                MapsError::Unexpected(e.to_string())
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| {
            error!(error = %e, "Failed to read HERE response");
            MapsError::Unexpected(e.to_string())
        })?;

        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
        Ok(HereResponse { status, body })
    }
}

#[async_trait]
impl MappingProvider for HereClient {
    #[instrument(skip(self))]
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, MapsError> {
        debug!("Geocoding address");

        let response = self
            .here_get(&self.config.geocode_url, &[("q", address.to_string())])
            .await?;

        if !response.status.is_success() {
            let message = response.detail(&["error_description", "error", "title"]);
            warn!(status = %response.status, message = %message, "HERE geocode error");
            return Err(MapsError::Provider {
                status: response.status.as_u16(),
                message,
            });
        }

        let parsed: GeocodeResponse = response
            .parse()
            .map_err(|e| MapsError::Unexpected(format!("invalid geocode response: {e}")))?;

        let item = parsed
            .items
            .into_iter()
            .next()
            .ok_or_else(|| MapsError::NotFound(address.to_string()))?;

        Ok(GeocodedAddress {
            lat: item.position.lat,
            lng: item.position.lng,
            address: item.title,
        })
    }

    #[instrument(skip(self))]
    async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, MapsError> {
        debug!("Reverse geocoding coordinate");

        let response = self
            .here_get(
                &self.config.reverse_geocode_url,
                &[("at", format!("{lat},{lng}"))],
            )
            .await?;

        if !response.status.is_success() {
            let message = response.detail(&["error_description", "error", "title"]);
            warn!(status = %response.status, message = %message, "HERE reverse geocode error");
            return Err(MapsError::Provider {
                status: response.status.as_u16(),
                message,
            });
        }

        let parsed: ReverseGeocodeResponse = response
            .parse()
            .map_err(|e| MapsError::Unexpected(format!("invalid reverse geocode response: {e}")))?;

        parsed
            .items
            .into_iter()
            .next()
            .and_then(|item| item.address.label)
            .ok_or_else(|| MapsError::NotFound(format!("{lat},{lng}")))
    }

    #[instrument(skip(self, origin, destination, vias), fields(vias = vias.len()))]
    async fn find_sequence(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        vias: &[Waypoint],
    ) -> Result<Vec<SequencedWaypoint>, MapsError> {
        let mut params: Vec<(String, String)> = Vec::with_capacity(vias.len() + 3);
        params.push(("start".to_string(), sequence_param(origin)));
        for (i, via) in vias.iter().enumerate() {
            params.push((format!("destination{}", i + 1), sequence_param(via)));
        }
        params.push(("end".to_string(), sequence_param(destination)));
        params.push(("mode".to_string(), "fastest;car".to_string()));

        let borrowed: Vec<(&str, String)> =
            params.iter().map(|(k, v)| (k.as_str(), v.clone())).collect();

        let response = self.here_get(&self.config.sequence_url, &borrowed).await?;

        if !response.status.is_success() {
            let detail = response.detail(&["faultCode", "type", "title", "message"]);
            error!(status = %response.status, detail = %detail, "HERE sequencing error");
            return Err(MapsError::SequencingFailed(detail));
        }

        let parsed: SequenceResponse = response
            .parse()
            .map_err(|e| MapsError::SequencingFailed(format!("invalid sequence response: {e}")))?;

        parsed
            .results
            .into_iter()
            .next()
            .map(|r| r.waypoints)
            .filter(|w| !w.is_empty())
            .ok_or_else(|| {
                MapsError::SequencingFailed("no waypoint sequence returned".to_string())
            })
    }

    #[instrument(skip(self, ordered), fields(waypoints = ordered.len()))]
    async fn calculate_route(&self, ordered: &[Waypoint]) -> Result<Vec<RouteSection>, MapsError> {
        if ordered.len() < 2 {
            return Err(MapsError::InvalidInput(
                "a route needs at least two waypoints".to_string(),
            ));
        }
        let origin = &ordered[0];
        let destination = &ordered[ordered.len() - 1];

        let mut params: Vec<(&str, String)> = vec![
            ("origin", origin.coordinates()),
            ("destination", destination.coordinates()),
        ];
        for via in &ordered[1..ordered.len() - 1] {
            params.push(("via", via.coordinates()));
        }
        params.extend([
            ("transportMode", "car".to_string()),
            ("routingMode", "fast".to_string()),
            ("return", "polyline,summary,actions,instructions".to_string()),
            ("departureTime", "any".to_string()),
        ]);

        let response = self.here_get(&self.config.routes_url, &params).await?;

        if !response.status.is_success() {
            let detail = response.detail(&["title", "cause"]);
            error!(status = %response.status, detail = %detail, "HERE routing error");
            return Err(MapsError::RoutingFailed(detail));
        }

        let parsed: RoutesResponse = response
            .parse()
            .map_err(|e| MapsError::RoutingFailed(format!("invalid routing response: {e}")))?;

        parsed
            .routes
            .into_iter()
            .next()
            .map(|r| r.sections)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| MapsError::RoutingFailed("no route returned".to_string()))
    }
}

/// `id;lat,lng` as expected by the sequencing API
fn sequence_param(waypoint: &Waypoint) -> String {
    format!("{};{}", waypoint.id, waypoint.coordinates())
}

// HERE API response types

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    #[serde(default)]
    items: Vec<GeocodeItem>,
}

#[derive(Debug, Deserialize)]
struct GeocodeItem {
    title: String,
    position: Position,
}

#[derive(Debug, Deserialize)]
struct Position {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct ReverseGeocodeResponse {
    #[serde(default)]
    items: Vec<ReverseGeocodeItem>,
}

#[derive(Debug, Deserialize)]
struct ReverseGeocodeItem {
    address: ReverseAddress,
}

#[derive(Debug, Deserialize)]
struct ReverseAddress {
    label: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SequenceResponse {
    #[serde(default)]
    results: Vec<SequenceResult>,
}

#[derive(Debug, Deserialize)]
struct SequenceResult {
    #[serde(default)]
    waypoints: Vec<SequencedWaypoint>,
}

#[derive(Debug, Deserialize)]
struct RoutesResponse {
    #[serde(default)]
    routes: Vec<RouteBody>,
}

#[derive(Debug, Deserialize)]
struct RouteBody {
    #[serde(default)]
    sections: Vec<RouteSection>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_param_format() {
        let wp = Waypoint::new("via-0", 52.5, 13.4);
        assert_eq!(sequence_param(&wp), "via-0;52.5,13.4");
    }

    #[test]
    fn test_detail_prefers_first_present_field() {
        let response = HereResponse {
            status: StatusCode::BAD_REQUEST,
            body: serde_json::json!({"error": "Bad Request", "error_description": "apiKey invalid"}),
        };
        assert_eq!(
            response.detail(&["error_description", "error"]),
            "apiKey invalid"
        );
    }

    #[test]
    fn test_detail_falls_back_to_status() {
        let response = HereResponse {
            status: StatusCode::BAD_GATEWAY,
            body: serde_json::Value::String("upstream down".to_string()),
        };
        assert_eq!(response.detail(&["title"]), "HTTP 502 Bad Gateway");
    }
}
