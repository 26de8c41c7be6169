//! Routeplan Billing Core - Plans, usage and Stripe
//!
//! Plan policy, Stripe integration, webhook verification and the
//! subscription state reconciler.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use routeplan_billing_core::{BillingConfig, BillingService, StripeProvider};
//!
//! let config = BillingConfig::new("sk_test_...", "whsec_...")
//!     .with_app_url("https://app.example.com");
//! let provider = Arc::new(StripeProvider::new(config.clone()));
//! let billing = BillingService::new(provider, profiles, config);
//!
//! // Gate an optimization with two intermediate stops
//! let admission = billing.admit_optimization(&user_id, 2).await?;
//!
//! // Start a checkout
//! let session = billing.create_checkout(&user_id, &plan_id).await?;
//! ```

pub mod config;
pub mod error;
pub mod policy;
pub mod provider;
pub mod reconciler;
pub mod service;
pub mod stripe;
pub mod webhook;

pub use config::BillingConfig;
pub use error::BillingError;
pub use policy::{
    check_stop_limit, check_usage_limit, resolve_limits, LimitKind, PolicyRejection,
};
pub use provider::{CardDetails, CheckoutRequest, CheckoutSession, PaymentProvider};
pub use reconciler::{transition, BillingEvent, SubscriptionSnapshot, SubscriptionStatus};
pub use service::{Admission, BillingService, InvoiceSummary, UpgradeOutcome};
pub use stripe::{
    StripeCustomer, StripeInvoice, StripeProvider, StripeSubscription, USER_ID_METADATA_KEY,
};
pub use webhook::{WebhookEvent, WebhookEventData, WebhookEventType, WebhookHandler};
