//! Cached geocoding

use std::sync::Arc;

use tracing::{debug, instrument};

use routeplan_types::GeocodedAddress;

use crate::cache::{normalize_address, GeocodeCache};
use crate::error::MapsError;
use crate::provider::MappingProvider;

/// Geocoder with write-through caching
#[derive(Clone)]
pub struct Geocoder {
    provider: Arc<dyn MappingProvider>,
    cache: GeocodeCache,
}

impl std::fmt::Debug for Geocoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Geocoder")
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Geocoder {
    pub fn new(provider: Arc<dyn MappingProvider>, cache: GeocodeCache) -> Self {
        Self { provider, cache }
    }

    /// Geocode free text.
    ///
    /// The cache is keyed by the normalized address while the provider
    /// receives the text as given. Only successes are cached.
    #[instrument(skip(self))]
    pub async fn geocode(&self, address: &str) -> Result<GeocodedAddress, MapsError> {
        if address.trim().is_empty() {
            return Err(MapsError::InvalidInput(
                "address must be a non-empty string".to_string(),
            ));
        }

        let key = normalize_address(address);
        if let Some(hit) = self.cache.get(&key).await {
            debug!("Geocode cache hit");
            return Ok(hit);
        }

        let result = self.provider.geocode(address).await?;
        self.cache.insert(key, &result).await;
        Ok(result)
    }

    /// Reverse-geocode a coordinate. Not cached.
    #[instrument(skip(self))]
    pub async fn reverse_geocode(&self, lat: f64, lng: f64) -> Result<String, MapsError> {
        if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
            return Err(MapsError::InvalidInput(format!("invalid latitude: {lat}")));
        }
        if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
            return Err(MapsError::InvalidInput(format!("invalid longitude: {lng}")));
        }
        self.provider.reverse_geocode(lat, lng).await
    }

    pub fn cache(&self) -> &GeocodeCache {
        &self.cache
    }
}
