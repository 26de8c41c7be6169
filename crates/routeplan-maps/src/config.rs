//! Maps configuration

use std::time::Duration;

const HERE_GEOCODE_URL: &str = "https://geocode.search.hereapi.com/v1/geocode";
const HERE_REVGEOCODE_URL: &str = "https://revgeocode.search.hereapi.com/v1/revgeocode";
const HERE_SEQUENCE_URL: &str = "https://wse.ls.hereapi.com/2/findsequence.json";
const HERE_ROUTES_URL: &str = "https://router.hereapi.com/v8/routes";

/// HERE API client configuration
#[derive(Clone)]
pub struct MapsConfig {
    /// HERE API key
    pub api_key: String,
    /// Forward geocoding endpoint
    pub geocode_url: String,
    /// Reverse geocoding endpoint
    pub reverse_geocode_url: String,
    /// Waypoint sequencing endpoint
    pub sequence_url: String,
    /// Routing endpoint
    pub routes_url: String,
    /// Per-request timeout for outbound calls
    pub request_timeout: Duration,
}

impl MapsConfig {
    /// Create a config pointing at the public HERE endpoints
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            geocode_url: HERE_GEOCODE_URL.to_string(),
            reverse_geocode_url: HERE_REVGEOCODE_URL.to_string(),
            sequence_url: HERE_SEQUENCE_URL.to_string(),
            routes_url: HERE_ROUTES_URL.to_string(),
            request_timeout: Duration::from_secs(15),
        }
    }

    /// Route every endpoint through one base URL (used with mock servers)
    #[must_use]
    pub fn with_base_url_override(mut self, base_url: impl AsRef<str>) -> Self {
        let base = base_url.as_ref().trim_end_matches('/');
        self.geocode_url = format!("{base}/v1/geocode");
        self.reverse_geocode_url = format!("{base}/v1/revgeocode");
        self.sequence_url = format!("{base}/2/findsequence.json");
        self.routes_url = format!("{base}/v8/routes");
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

impl std::fmt::Debug for MapsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapsConfig")
            .field("api_key", &"[redacted]")
            .field("geocode_url", &self.geocode_url)
            .field("reverse_geocode_url", &self.reverse_geocode_url)
            .field("sequence_url", &self.sequence_url)
            .field("routes_url", &self.routes_url)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

/// Geocode cache sizing.
#[derive(Debug, Clone)]
pub struct GeocodeCacheConfig {
    /// Maximum number of cached addresses.
    /// Default: 500
    pub max_entries: u64,

    /// Lifetime of an entry from insertion.
    /// Default: 7 days
    pub ttl: Duration,
}

impl Default for GeocodeCacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 500,
            ttl: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }
}

impl GeocodeCacheConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_entries(mut self, max: u64) -> Self {
        self.max_entries = max;
        self
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }
}

/// Pacing for batch geocoding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Addresses dispatched concurrently per group
    pub batch_size: usize,
    /// Pause between groups
    pub delay: Duration,
}

impl BatchConfig {
    /// Server-side pacing: groups of 5, 200ms apart
    pub fn server() -> Self {
        Self {
            batch_size: 5,
            delay: Duration::from_millis(200),
        }
    }

    /// Client-side pacing: groups of 2, 300ms apart
    pub fn client() -> Self {
        Self {
            batch_size: 2,
            delay: Duration::from_millis(300),
        }
    }
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self::server()
    }
}
