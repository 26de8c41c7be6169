//! Billing configuration

use std::time::Duration;

use routeplan_types::PlanCatalog;

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";
const DEFAULT_APP_URL: &str = "http://localhost:3000";

/// Billing service configuration
#[derive(Clone)]
pub struct BillingConfig {
    /// Stripe secret key
    pub stripe_secret_key: String,
    /// Stripe webhook signing secret
    pub stripe_webhook_secret: String,
    /// Publishable key handed to browsers
    pub stripe_publishable_key: Option<String>,
    /// Stripe API base URL
    pub api_base: String,
    /// Public URL of the web app, used for redirect targets
    pub app_url: String,
    /// Trial length offered to users who never had one
    pub trial_days: u32,
    /// Plan limits keyed by Stripe price id
    pub plans: PlanCatalog,
    /// Timeout for Stripe API calls
    pub request_timeout: Duration,
}

impl BillingConfig {
    /// Create a new billing config
    pub fn new(
        stripe_secret_key: impl Into<String>,
        stripe_webhook_secret: impl Into<String>,
    ) -> Self {
        Self {
            stripe_secret_key: stripe_secret_key.into(),
            stripe_webhook_secret: stripe_webhook_secret.into(),
            stripe_publishable_key: None,
            api_base: STRIPE_API_BASE.to_string(),
            app_url: DEFAULT_APP_URL.to_string(),
            trial_days: 7,
            plans: PlanCatalog::default(),
            request_timeout: Duration::from_secs(20),
        }
    }

    #[must_use]
    pub fn with_app_url(mut self, app_url: impl Into<String>) -> Self {
        self.app_url = app_url.into().trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn with_publishable_key(mut self, key: Option<String>) -> Self {
        self.stripe_publishable_key = key;
        self
    }

    #[must_use]
    pub fn with_trial_days(mut self, days: u32) -> Self {
        self.trial_days = days;
        self
    }

    #[must_use]
    pub fn with_plans(mut self, plans: PlanCatalog) -> Self {
        self.plans = plans;
        self
    }

    /// Point Stripe calls at another host (used with mock servers)
    #[must_use]
    pub fn with_api_base_override(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    /// Checkout success redirect. Stripe fills in the session id placeholder.
    pub fn success_url(&self) -> String {
        format!("{}/dashboard?session_id={{CHECKOUT_SESSION_ID}}", self.app_url)
    }

    pub fn cancel_url(&self) -> String {
        format!("{}/#pricing", self.app_url)
    }

    pub fn portal_return_url(&self) -> String {
        format!("{}/dashboard?billing_portal_return=true", self.app_url)
    }
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("stripe_secret_key", &"[redacted]")
            .field("stripe_webhook_secret", &"[redacted]")
            .field("stripe_publishable_key", &self.stripe_publishable_key)
            .field("api_base", &self.api_base)
            .field("app_url", &self.app_url)
            .field("trial_days", &self.trial_days)
            .field("plans", &self.plans.len())
            .finish_non_exhaustive()
    }
}
