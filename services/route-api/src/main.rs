//! Routeplan Route API server

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::connect_info::IntoMakeServiceWithConnectInfo;
use axum::Router;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use tokio::signal;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use route_api::{build_router, AppState, Config, MapsServices};
use routeplan_billing_core::{BillingService, StripeProvider};
use routeplan_identity::{ClerkProfileStore, SessionVerifier};
use routeplan_maps::{BatchConfig, GeocodeCacheConfig, HereClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("route_api=debug".parse()?))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Routeplan Route API");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!(
        http_port = config.http_port,
        maps_configured = config.maps.is_some(),
        plans = config.billing.plans.len(),
        "Configuration loaded"
    );

    // Initialize metrics
    let metrics_handle = if config.metrics_enabled {
        Some(setup_metrics()?)
    } else {
        None
    };

    // Maps services share one HERE client and one geocode cache
    let maps = match &config.maps {
        Some(maps_config) => Some(MapsServices::new(
            Arc::new(HereClient::new(maps_config.clone())),
            &GeocodeCacheConfig::default(),
            BatchConfig::server(),
        )),
        None => {
            tracing::warn!("HERE_API_KEY not set; maps endpoints will return configuration errors");
            None
        }
    };

    // Identity and billing
    let auth = Arc::new(SessionVerifier::new(config.identity.clone()));
    let profiles = Arc::new(ClerkProfileStore::new(config.identity.clone()));
    let provider = Arc::new(StripeProvider::new(config.billing.clone()));
    let billing = BillingService::new(provider, profiles, config.billing.clone());

    // Create application state
    let state = AppState::new(maps, billing, auth, config.clone());

    // Build HTTP router
    let app = build_router(state, metrics_handle);

    let http_addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    if let Err(e) = run_http_server(app, http_addr).await {
        tracing::error!(error = ?e, "HTTP server error");
        return Err(e);
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

async fn run_http_server(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("HTTP server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let service: IntoMakeServiceWithConnectInfo<Router, SocketAddr> =
        app.into_make_service_with_connect_info();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn setup_metrics() -> anyhow::Result<PrometheusHandle> {
    // Geocoding hits the cache in microseconds; optimizations make two
    // provider round trips and can take seconds.
    let latency_buckets = &[0.001, 0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

    let builder = PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("routeplan_operation_duration_seconds".to_string()),
        latency_buckets,
    )?;

    let handle = builder.install_recorder()?;

    // Register metrics with descriptions
    metrics::describe_counter!(
        "routeplan_geocode_cache_hits_total",
        "Geocode lookups answered from the cache"
    );
    metrics::describe_counter!(
        "routeplan_geocode_cache_misses_total",
        "Geocode lookups sent to the provider"
    );
    metrics::describe_counter!(
        "routeplan_optimizations_total",
        "Route optimizations by result"
    );
    metrics::describe_counter!(
        "routeplan_quota_rejections_total",
        "Optimizations refused by plan policy, by limit"
    );
    metrics::describe_counter!(
        "routeplan_webhooks_processed_total",
        "Total webhooks processed by status"
    );
    metrics::describe_counter!(
        "routeplan_checkouts_created_total",
        "Total checkout sessions created"
    );
    metrics::describe_histogram!(
        "routeplan_operation_duration_seconds",
        "Operation latency in seconds by operation and result"
    );

    Ok(handle)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
