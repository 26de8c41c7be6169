//! Application state for the Route API service.

use std::sync::Arc;

use routeplan_billing_core::BillingService;
use routeplan_identity::SessionAuthenticator;
use routeplan_maps::{
    BatchConfig, BatchGeocoder, GeocodeCache, GeocodeCacheConfig, Geocoder, MappingProvider,
    RouteOptimizer,
};

use crate::config::Config;
use crate::error::ApiError;

/// Geocoding and routing services sharing one provider and one cache
#[derive(Debug, Clone)]
pub struct MapsServices {
    pub geocoder: Geocoder,
    pub batch: BatchGeocoder,
    pub optimizer: RouteOptimizer,
}

impl MapsServices {
    pub fn new(
        provider: Arc<dyn MappingProvider>,
        cache_config: &GeocodeCacheConfig,
        batch_config: BatchConfig,
    ) -> Self {
        let geocoder = Geocoder::new(provider.clone(), GeocodeCache::new(cache_config));
        Self {
            batch: BatchGeocoder::new(geocoder.clone(), batch_config),
            optimizer: RouteOptimizer::new(provider),
            geocoder,
        }
    }
}

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    /// Maps services; absent when no HERE key is configured
    pub maps: Option<Arc<MapsServices>>,
    /// Billing service (plan policy, checkout, webhooks)
    pub billing: Arc<BillingService>,
    /// Session token verification
    pub auth: Arc<dyn SessionAuthenticator>,
    /// Configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Create new application state
    pub fn new(
        maps: Option<MapsServices>,
        billing: BillingService,
        auth: Arc<dyn SessionAuthenticator>,
        config: Config,
    ) -> Self {
        Self {
            maps: maps.map(Arc::new),
            billing: Arc::new(billing),
            auth,
            config: Arc::new(config),
        }
    }

    /// Maps services, or a configuration error when the API key is missing
    pub fn maps(&self) -> Result<&MapsServices, ApiError> {
        self.maps.as_deref().ok_or_else(|| {
            tracing::error!("HERE_API_KEY is not configured");
            ApiError::Configuration("Server configuration error: Missing API key.".to_string())
        })
    }

    /// Get request timeout from config
    pub fn request_timeout(&self) -> std::time::Duration {
        self.config.request_timeout
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("maps_configured", &self.maps.is_some())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
