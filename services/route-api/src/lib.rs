//! Routeplan Route API
//!
//! HTTP surface for geocoding, route optimization and subscription billing.
//!
//! ## Maps Endpoints
//!
//! - `POST /geocode` - Forward geocode one address
//! - `POST /batch-geocode` - Geocode many addresses with pacing
//! - `POST /reverse-geocode` - Address label for a coordinate
//! - `POST /optimize-route` - Best stop order and route (authenticated, plan-gated)
//!
//! ## Billing Endpoints (authenticated)
//!
//! - `POST /create-checkout-session`
//! - `POST /create-customer-portal-session`
//! - `POST /create-stripe-customer`
//! - `POST /cancel-subscription`
//! - `POST /update-subscription`
//! - `GET|POST /get-billing-history`
//! - `GET|POST /get-payment-method`
//! - `POST /clear-pending-payment-details`
//!
//! ## Other
//!
//! - `POST /stripe-webhooks` - Stripe webhook receiver (signature-verified)
//! - `GET /public-config` - Publishable Stripe key
//! - `GET /health`, `GET /ready`, `GET /metrics`

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

pub use crate::config::{Config, ConfigError};
pub use crate::error::{ApiError, ApiResult};
pub use crate::state::{AppState, MapsServices};

use crate::handlers::{health, ready};

pub fn build_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let request_timeout = state.request_timeout();

    // Maps routes
    let maps_routes = Router::new()
        .route("/geocode", post(handlers::geocode))
        .route("/batch-geocode", post(handlers::batch_geocode))
        .route("/reverse-geocode", post(handlers::reverse_geocode))
        .route("/optimize-route", post(handlers::optimize_route));

    // Billing routes
    let billing_routes = Router::new()
        .route("/create-checkout-session", post(handlers::create_checkout))
        .route(
            "/create-customer-portal-session",
            post(handlers::create_portal),
        )
        .route("/create-stripe-customer", post(handlers::create_stripe_customer))
        .route("/cancel-subscription", post(handlers::cancel_subscription))
        .route("/update-subscription", post(handlers::update_subscription))
        .route(
            "/get-billing-history",
            get(handlers::billing_history).post(handlers::billing_history),
        )
        .route(
            "/get-payment-method",
            get(handlers::payment_method).post(handlers::payment_method),
        )
        .route(
            "/clear-pending-payment-details",
            post(handlers::clear_pending_payment),
        )
        .route("/public-config", get(handlers::public_config));

    // Webhook route (separate - uses raw body, no JSON parsing)
    let webhook_routes = Router::new().route("/stripe-webhooks", post(handlers::stripe_webhook));

    // Health routes (no timeout - must always respond quickly)
    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready));

    // Metrics route (no timeout)
    let metrics_route = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    // Build middleware stack (order matters - outermost first)
    let middleware = ServiceBuilder::new()
        // Request ID propagation (outermost)
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        // Tracing with request details
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // CORS
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        // Request timeout (innermost - closest to handler)
        .layer(TimeoutLayer::new(request_timeout));

    // Combine all routes
    Router::new()
        .merge(maps_routes)
        .merge(billing_routes)
        .merge(webhook_routes)
        .layer(middleware)
        .merge(health_routes) // Health routes without timeout
        .merge(metrics_route) // Metrics route without timeout
        .with_state(state)
}
