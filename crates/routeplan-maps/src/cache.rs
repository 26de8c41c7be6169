//! Geocode caches
//!
//! [`GeocodeCache`] is the bounded in-process cache shared by every request
//! in the server. [`PersistentGeocodeCache`] is the client-side variant that
//! survives restarts as a JSON file. Both expire entries a fixed time after
//! insertion and never surface errors on lookup; a miss simply falls through
//! to the provider.

use std::collections::HashMap;
use std::fs;
use std::io::Result as IoResult;
use std::path::Path;
use std::time::Duration;

use chrono::Utc;
use moka::future::Cache;
use moka::policy::EvictionPolicy;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use routeplan_types::GeocodedAddress;

use crate::config::GeocodeCacheConfig;

/// Normalize an address into its cache key: trimmed and lowercased.
pub fn normalize_address(address: &str) -> String {
    address.trim().to_lowercase()
}

/// A cached forward-geocoding result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedGeocode {
    pub lat: f64,
    pub lng: f64,
    /// Canonical label from the provider
    pub address: String,
    /// Insertion time (Unix seconds)
    pub cached_at: i64,
}

impl CachedGeocode {
    fn new(value: &GeocodedAddress, cached_at: i64) -> Self {
        Self {
            lat: value.lat,
            lng: value.lng,
            address: value.address.clone(),
            cached_at,
        }
    }

    fn to_geocoded(&self) -> GeocodedAddress {
        GeocodedAddress {
            lat: self.lat,
            lng: self.lng,
            address: self.address.clone(),
        }
    }
}

/// In-memory LRU geocode cache.
///
/// Cloning is cheap and every clone shares the same entries.
#[derive(Clone)]
pub struct GeocodeCache {
    inner: Cache<String, CachedGeocode>,
    config: GeocodeCacheConfig,
}

impl std::fmt::Debug for GeocodeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeocodeCache")
            .field("config", &self.config)
            .field("entries", &self.inner.entry_count())
            .finish_non_exhaustive()
    }
}

impl GeocodeCache {
    /// Build a cache sized by `config`
    pub fn new(config: &GeocodeCacheConfig) -> Self {
        let inner = Cache::builder()
            .max_capacity(config.max_entries)
            .time_to_live(config.ttl)
            .eviction_policy(EvictionPolicy::lru())
            .build();

        Self {
            inner,
            config: config.clone(),
        }
    }

    /// Look up a normalized address. A hit refreshes its recency.
    #[instrument(skip(self), level = "debug")]
    pub async fn get(&self, normalized: &str) -> Option<GeocodedAddress> {
        match self.inner.get(normalized).await {
            Some(entry) => {
                metrics::counter!("routeplan_geocode_cache_hits_total").increment(1);
                Some(entry.to_geocoded())
            }
            None => {
                metrics::counter!("routeplan_geocode_cache_misses_total").increment(1);
                None
            }
        }
    }

    /// Store a result under its normalized address
    pub async fn insert(&self, normalized: String, value: &GeocodedAddress) {
        let entry = CachedGeocode::new(value, Utc::now().timestamp());
        self.inner.insert(normalized, entry).await;
    }

    /// Approximate number of live entries
    pub fn entry_count(&self) -> u64 {
        self.inner.entry_count()
    }

    /// Flush pending evictions so that `entry_count` is exact
    pub async fn run_pending_tasks(&self) {
        self.inner.run_pending_tasks().await;
    }

    pub fn config(&self) -> &GeocodeCacheConfig {
        &self.config
    }
}

/// File-backed geocode cache for long-running clients.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PersistentGeocodeCache {
    entries: HashMap<String, CachedGeocode>,
    #[serde(skip)]
    ttl: Duration,
}

impl PersistentGeocodeCache {
    /// An empty cache with the given entry lifetime
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Load a cache file, dropping expired entries. A missing file yields
    /// an empty cache.
    pub fn load_from_file<P: AsRef<Path>>(path: P, ttl: Duration) -> IoResult<Self> {
        let mut cache = if path.as_ref().exists() {
            let data = fs::read_to_string(path)?;
            serde_json::from_str::<Self>(&data)?
        } else {
            Self::default()
        };
        cache.ttl = ttl;

        let before = cache.entries.len();
        cache.prune_expired();
        debug!(
            loaded = before,
            kept = cache.entries.len(),
            "Loaded persistent geocode cache"
        );
        Ok(cache)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> IoResult<()> {
        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data)
    }

    /// Look up an address (normalized internally), ignoring expired entries
    pub fn get(&self, address: &str) -> Option<GeocodedAddress> {
        let now = Utc::now().timestamp();
        self.entries
            .get(&normalize_address(address))
            .filter(|entry| !self.is_expired(entry, now))
            .map(CachedGeocode::to_geocoded)
    }

    pub fn insert(&mut self, address: &str, value: &GeocodedAddress) {
        self.insert_at(address, value, Utc::now().timestamp());
    }

    fn insert_at(&mut self, address: &str, value: &GeocodedAddress, cached_at: i64) {
        self.entries
            .insert(normalize_address(address), CachedGeocode::new(value, cached_at));
    }

    /// Remove every expired entry
    pub fn prune_expired(&mut self) {
        let now = Utc::now().timestamp();
        let ttl = self.ttl_seconds();
        self.entries.retain(|_, entry| now - entry.cached_at < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CachedGeocode, now: i64) -> bool {
        now - entry.cached_at >= self.ttl_seconds()
    }

    fn ttl_seconds(&self) -> i64 {
        i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX)
    }
}
