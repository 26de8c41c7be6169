//! Configuration for the Route API service.

use std::time::Duration;

use routeplan_billing_core::BillingConfig;
use routeplan_identity::IdentityConfig;
use routeplan_maps::MapsConfig;
use routeplan_types::PlanCatalog;

/// Route API configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub http_port: u16,
    /// HERE settings; maps endpoints answer with a configuration error when absent
    pub maps: Option<MapsConfig>,
    /// Billing core configuration
    pub billing: BillingConfig,
    /// Clerk configuration
    pub identity: IdentityConfig,
    /// Request timeout
    pub request_timeout: Duration,
    /// Metrics enabled
    pub metrics_enabled: bool,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Server port
        let http_port = std::env::var("HTTP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("HTTP_PORT"))?;

        // HERE
        let maps = std::env::var("HERE_API_KEY")
            .ok()
            .filter(|key| !key.trim().is_empty())
            .map(MapsConfig::new);

        // Stripe configuration
        let stripe_secret_key = std::env::var("STRIPE_SECRET_KEY")
            .map_err(|_| ConfigError::Missing("STRIPE_SECRET_KEY"))?;

        let stripe_webhook_secret = std::env::var("STRIPE_WEBHOOK_SECRET")
            .map_err(|_| ConfigError::Missing("STRIPE_WEBHOOK_SECRET"))?;

        let stripe_publishable_key = std::env::var("STRIPE_PUBLISHABLE_KEY")
            .or_else(|_| std::env::var("NEXT_PUBLIC_STRIPE_PUBLISHABLE_KEY"))
            .ok();

        let app_url = std::env::var("APP_URL")
            .or_else(|_| std::env::var("NEXT_PUBLIC_APP_URL"))
            .unwrap_or_else(|_| "http://localhost:3000".to_string());

        let trial_days: u32 = std::env::var("STRIPE_TRIAL_DAYS")
            .unwrap_or_else(|_| "7".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("STRIPE_TRIAL_DAYS"))?;

        let plans = match std::env::var("PLAN_CATALOG") {
            Ok(json) => {
                PlanCatalog::from_json(&json).map_err(|_| ConfigError::Invalid("PLAN_CATALOG"))?
            }
            Err(_) => PlanCatalog::default(),
        };

        // Clerk configuration
        let clerk_secret_key = std::env::var("CLERK_SECRET_KEY")
            .map_err(|_| ConfigError::Missing("CLERK_SECRET_KEY"))?;

        let clerk_jwks_url =
            std::env::var("CLERK_JWKS_URL").map_err(|_| ConfigError::Missing("CLERK_JWKS_URL"))?;

        let mut identity = IdentityConfig::new(clerk_secret_key, clerk_jwks_url);
        if let Ok(issuer) = std::env::var("CLERK_ISSUER") {
            identity = identity.with_issuer(issuer);
        }
        if let Ok(parties) = std::env::var("CLERK_AUTHORIZED_PARTIES") {
            identity = identity.with_authorized_parties(parse_list(&parties));
        }

        // Request timeout
        let request_timeout_secs: u64 = std::env::var("REQUEST_TIMEOUT_SECS")
            .unwrap_or_else(|_| "30".to_string())
            .parse()
            .map_err(|_| ConfigError::Invalid("REQUEST_TIMEOUT_SECS"))?;

        // Metrics
        let metrics_enabled = std::env::var("METRICS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);

        // Build billing config
        let billing = BillingConfig::new(stripe_secret_key, stripe_webhook_secret)
            .with_app_url(app_url)
            .with_publishable_key(stripe_publishable_key)
            .with_trial_days(trial_days)
            .with_plans(plans);

        Ok(Self {
            http_port,
            maps,
            billing,
            identity,
            request_timeout: Duration::from_secs(request_timeout_secs),
            metrics_enabled,
        })
    }
}

/// Split a comma-separated variable, dropping blanks
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
