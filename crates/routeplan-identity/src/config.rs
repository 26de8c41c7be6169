//! Identity provider configuration

use std::time::Duration;

const CLERK_API_BASE: &str = "https://api.clerk.com/v1";

/// Clerk configuration
#[derive(Clone)]
pub struct IdentityConfig {
    /// Backend API secret key (`sk_...`)
    pub secret_key: String,
    /// Backend API base URL
    pub api_base: String,
    /// JWKS endpoint for session token keys
    pub jwks_url: String,
    /// Expected `iss` claim; unchecked when absent
    pub issuer: Option<String>,
    /// Accepted `azp` origins; unchecked when empty
    pub authorized_parties: Vec<String>,
    /// How long fetched keys stay cached
    pub jwks_cache_duration: Duration,
    /// Clock skew tolerated on `exp`/`nbf`
    pub leeway: Duration,
    /// Timeout for Backend API calls
    pub request_timeout: Duration,
}

impl IdentityConfig {
    pub fn new(secret_key: impl Into<String>, jwks_url: impl Into<String>) -> Self {
        Self {
            secret_key: secret_key.into(),
            api_base: CLERK_API_BASE.to_string(),
            jwks_url: jwks_url.into(),
            issuer: None,
            authorized_parties: Vec::new(),
            jwks_cache_duration: Duration::from_secs(60 * 60), // 1 hour
            leeway: Duration::from_secs(5),
            request_timeout: Duration::from_secs(10),
        }
    }

    /// Point Backend API calls at another host (used with mock servers)
    #[must_use]
    pub fn with_api_base_override(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    #[must_use]
    pub fn with_authorized_parties(mut self, parties: Vec<String>) -> Self {
        self.authorized_parties = parties;
        self
    }

    #[must_use]
    pub fn with_jwks_cache_duration(mut self, duration: Duration) -> Self {
        self.jwks_cache_duration = duration;
        self
    }
}

impl std::fmt::Debug for IdentityConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityConfig")
            .field("secret_key", &"[redacted]")
            .field("api_base", &self.api_base)
            .field("jwks_url", &self.jwks_url)
            .field("issuer", &self.issuer)
            .field("authorized_parties", &self.authorized_parties)
            .field("jwks_cache_duration", &self.jwks_cache_duration)
            .finish_non_exhaustive()
    }
}
