//! Routeplan Maps - Geocoding and route optimization
//!
//! Wraps the HERE geocoding, waypoint-sequencing and routing APIs behind the
//! [`MappingProvider`] trait, and builds the higher-level operations on top:
//! a cached [`Geocoder`], a rate-paced [`BatchGeocoder`] and the two-phase
//! [`RouteOptimizer`].
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use routeplan_maps::{
//!     BatchConfig, BatchGeocoder, GeocodeCache, GeocodeCacheConfig, Geocoder, HereClient,
//!     MapsConfig, RouteOptimizer,
//! };
//!
//! let provider = Arc::new(HereClient::new(MapsConfig::new("here-api-key")));
//! let geocoder = Geocoder::new(provider.clone(), GeocodeCache::new(&GeocodeCacheConfig::default()));
//!
//! let berlin = geocoder.geocode("Alexanderplatz, Berlin").await?;
//! let batch = BatchGeocoder::new(geocoder.clone(), BatchConfig::server());
//! let results = batch.geocode_batch(&addresses).await;
//!
//! let route = RouteOptimizer::new(provider).optimize(&origin, &destination, &stops).await?;
//! ```

pub mod batch;
pub mod cache;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod here;
pub mod optimizer;
pub mod provider;

pub use batch::{BatchGeocoder, BatchResults};
pub use cache::{normalize_address, CachedGeocode, GeocodeCache, PersistentGeocodeCache};
pub use config::{BatchConfig, GeocodeCacheConfig, MapsConfig};
pub use error::MapsError;
pub use geocoder::Geocoder;
pub use here::HereClient;
pub use optimizer::{validate_waypoints, RouteOptimizer};
pub use provider::{MappingProvider, RouteSection, SectionEndpoint, SequencedWaypoint};
