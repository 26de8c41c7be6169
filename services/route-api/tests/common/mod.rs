//! Router test harness with in-memory fakes

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;

use route_api::{build_router, AppState, Config, MapsServices};
use routeplan_billing_core::stripe::{StripeList, StripePrice, StripeSubscriptionItem};
use routeplan_billing_core::{
    BillingConfig, BillingError, BillingService, CardDetails, CheckoutRequest, CheckoutSession,
    PaymentProvider, StripeCustomer, StripeInvoice, StripeSubscription, USER_ID_METADATA_KEY,
};
use routeplan_identity::{
    IdentityConfig, IdentityError, InMemoryProfileStore, SessionAuthenticator, VerifiedSession,
};
use routeplan_maps::{
    BatchConfig, GeocodeCacheConfig, MapsError, MappingProvider, RouteSection, SectionEndpoint,
    SequencedWaypoint,
};
use routeplan_types::{
    GeocodedAddress, LegSummary, PlanCycle, PlanId, SubscriptionState, UserContact, UserId,
    UserSubscriptionProfile, Waypoint,
};

pub const TOKEN: &str = "valid-session-token";
pub const WEBHOOK_SECRET: &str = "whsec_router_test";
pub const PUBLISHABLE_KEY: &str = "pk_test_routeplan";
pub const UNSEQUENCEABLE_ID: &str = "island";
pub const UNROUTABLE_ID: &str = "ferry";

pub fn user() -> UserId {
    UserId::parse("user_2abc").unwrap()
}

// ============================================================================
// Session authenticator
// ============================================================================

/// Accepts exactly one token
pub struct FakeAuthenticator;

#[async_trait]
impl SessionAuthenticator for FakeAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<VerifiedSession, IdentityError> {
        if token == TOKEN {
            Ok(VerifiedSession {
                user_id: user(),
                session_id: Some("sess_1".to_string()),
            })
        } else {
            Err(IdentityError::InvalidToken)
        }
    }
}

// ============================================================================
// Mapping provider
// ============================================================================

/// Geocodes everything to Berlin except addresses containing "nowhere".
/// Sequencing reverses the via stops and fails when a waypoint is named
/// [`UNSEQUENCEABLE_ID`]; routing fails for [`UNROUTABLE_ID`].
#[derive(Default)]
pub struct FakeMappingProvider {
    pub geocode_calls: AtomicUsize,
    pub sequence_calls: AtomicUsize,
}

#[async_trait]
impl MappingProvider for FakeMappingProvider {
    async fn geocode(&self, address: &str) -> Result<GeocodedAddress, MapsError> {
        self.geocode_calls.fetch_add(1, Ordering::SeqCst);
        if address.to_lowercase().contains("nowhere") {
            return Err(MapsError::NotFound(address.to_string()));
        }
        Ok(GeocodedAddress {
            lat: 52.52,
            lng: 13.405,
            address: format!("{}, Berlin", address.trim()),
        })
    }

    async fn reverse_geocode(&self, _lat: f64, _lng: f64) -> Result<String, MapsError> {
        Ok("Alexanderplatz 1, 10178 Berlin".to_string())
    }

    async fn find_sequence(
        &self,
        origin: &Waypoint,
        destination: &Waypoint,
        vias: &[Waypoint],
    ) -> Result<Vec<SequencedWaypoint>, MapsError> {
        self.sequence_calls.fetch_add(1, Ordering::SeqCst);
        if vias.iter().any(|w| w.id == UNSEQUENCEABLE_ID) {
            return Err(MapsError::SequencingFailed(
                "no feasible sequence for the given waypoints".to_string(),
            ));
        }
        let ordered = std::iter::once(origin)
            .chain(vias.iter().rev())
            .chain(std::iter::once(destination));
        Ok(ordered
            .enumerate()
            .map(|(i, w)| SequencedWaypoint {
                id: w.id.clone(),
                lat: w.lat,
                lng: w.lng,
                sequence: i as u32,
            })
            .collect())
    }

    async fn calculate_route(&self, ordered: &[Waypoint]) -> Result<Vec<RouteSection>, MapsError> {
        if ordered.iter().any(|w| w.id == UNROUTABLE_ID) {
            return Err(MapsError::Provider {
                status: 400,
                message: "No route found".to_string(),
            });
        }
        Ok(ordered
            .windows(2)
            .map(|pair| RouteSection {
                departure: SectionEndpoint {
                    place: serde_json::json!({"location": {"lat": pair[0].lat, "lng": pair[0].lng}}),
                    time: None,
                },
                arrival: SectionEndpoint {
                    place: serde_json::json!({"location": {"lat": pair[1].lat, "lng": pair[1].lng}}),
                    time: None,
                },
                summary: LegSummary {
                    duration: 600,
                    length: 5_000,
                },
                polyline: None,
                actions: Vec::new(),
            })
            .collect())
    }
}

// ============================================================================
// Payment provider
// ============================================================================

/// Minimal Stripe stand-in holding one customer and its subscriptions
#[derive(Default)]
pub struct FakePayments {
    pub subscriptions: Mutex<HashMap<String, StripeSubscription>>,
    pub cards: Mutex<HashMap<String, CardDetails>>,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
}

pub fn customer(id: &str) -> StripeCustomer {
    StripeCustomer {
        id: id.to_string(),
        email: Some("driver@example.com".to_string()),
        name: Some("Dana Driver".to_string()),
        deleted: false,
        metadata: HashMap::from([(USER_ID_METADATA_KEY.to_string(), "user_2abc".to_string())]),
    }
}

pub fn subscription(id: &str, plan: &str, status: &str) -> StripeSubscription {
    StripeSubscription {
        id: id.to_string(),
        customer: "cus_1".to_string(),
        status: status.to_string(),
        current_period_start: Some(1_700_000_000),
        trial_end: None,
        cancel_at_period_end: false,
        latest_invoice: None,
        items: StripeList {
            data: vec![StripeSubscriptionItem {
                id: format!("si_{id}"),
                price: StripePrice {
                    id: plan.to_string(),
                },
                current_period_start: None,
            }],
            has_more: false,
        },
    }
}

impl FakePayments {
    fn subscription(&self, id: &str) -> Result<StripeSubscription, BillingError> {
        self.subscriptions
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| BillingError::ProviderError(format!("No such subscription: '{id}'")))
    }
}

#[async_trait]
impl PaymentProvider for FakePayments {
    async fn create_customer(
        &self,
        _email: &str,
        _name: Option<&str>,
        _user_id: &UserId,
    ) -> Result<StripeCustomer, BillingError> {
        Ok(customer("cus_1"))
    }

    async fn find_customers_by_email(
        &self,
        _email: &str,
    ) -> Result<Vec<StripeCustomer>, BillingError> {
        Ok(Vec::new())
    }

    async fn get_customer(&self, customer_id: &str) -> Result<StripeCustomer, BillingError> {
        Ok(customer(customer_id))
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        self.checkouts.lock().unwrap().push(request.clone());
        Ok(CheckoutSession {
            session_id: "cs_test_1".to_string(),
            url: Some("https://checkout.stripe.com/c/pay/cs_test_1".to_string()),
        })
    }

    async fn create_portal_session(
        &self,
        _customer_id: &str,
        _return_url: &str,
    ) -> Result<String, BillingError> {
        Ok("https://billing.stripe.com/p/session/test".to_string())
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        self.subscription(subscription_id)
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let mut sub = self.subscription(subscription_id)?;
        sub.status = "canceled".to_string();
        Ok(sub)
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        _item_id: &str,
        price_id: &PlanId,
    ) -> Result<StripeSubscription, BillingError> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs
            .get_mut(subscription_id)
            .ok_or_else(|| BillingError::ProviderError("No such subscription".to_string()))?;
        for item in &mut sub.items.data {
            item.price.id = price_id.to_string();
        }
        Ok(sub.clone())
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<StripeInvoice, BillingError> {
        Err(BillingError::ProviderError(format!("No such invoice: '{invoice_id}'")))
    }

    async fn list_invoices(
        &self,
        _customer_id: &str,
        _limit: u32,
    ) -> Result<Vec<StripeInvoice>, BillingError> {
        Ok(Vec::new())
    }

    async fn default_card(&self, customer_id: &str) -> Result<Option<CardDetails>, BillingError> {
        Ok(self.cards.lock().unwrap().get(customer_id).cloned())
    }
}

// ============================================================================
// App
// ============================================================================

pub struct TestApp {
    pub router: Router,
    pub store: InMemoryProfileStore,
    pub maps: Arc<FakeMappingProvider>,
    pub payments: Arc<FakePayments>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(true)
    }

    /// No HERE key configured
    pub fn without_maps() -> Self {
        Self::build(false)
    }

    fn build(with_maps: bool) -> Self {
        let maps = Arc::new(FakeMappingProvider::default());
        let payments = Arc::new(FakePayments::default());
        let store = InMemoryProfileStore::new();
        store.insert_user(
            user(),
            UserContact {
                email: Some("driver@example.com".to_string()),
                name: Some("Dana Driver".to_string()),
            },
        );

        let billing_config = BillingConfig::new("sk_test", WEBHOOK_SECRET)
            .with_app_url("https://app.test")
            .with_publishable_key(Some(PUBLISHABLE_KEY.to_string()));
        let config = Config {
            http_port: 0,
            maps: None,
            billing: billing_config.clone(),
            identity: IdentityConfig::new("sk_clerk_test", "http://127.0.0.1:1/jwks"),
            request_timeout: Duration::from_secs(10),
            metrics_enabled: false,
        };

        let billing =
            BillingService::new(payments.clone(), Arc::new(store.clone()), billing_config);
        let maps_services = with_maps.then(|| {
            MapsServices::new(
                maps.clone(),
                &GeocodeCacheConfig::default(),
                BatchConfig {
                    batch_size: 5,
                    delay: Duration::from_millis(1),
                },
            )
        });
        let state = AppState::new(maps_services, billing, Arc::new(FakeAuthenticator), config);

        Self {
            router: build_router(state, None),
            store,
            maps,
            payments,
        }
    }

    /// Give the test user an active plan with `used` optimizations this cycle
    pub fn subscribe(&self, plan: &str, used: u32) {
        let mut cycle = PlanCycle::new(
            PlanId::from(plan),
            Some("sub_1".to_string()),
            Some(1_700_000_000),
        );
        cycle.optimizations_used = used;
        self.store.put_profile(
            user(),
            UserSubscriptionProfile {
                state: SubscriptionState::Active(cycle),
                stripe_customer_id: Some("cus_1".to_string()),
                has_had_free_trial: true,
                ..Default::default()
            },
        );
        self.payments
            .subscriptions
            .lock()
            .unwrap()
            .insert("sub_1".to_string(), subscription("sub_1", plan, "active"));
    }

    pub fn profile(&self) -> UserSubscriptionProfile {
        self.store.snapshot(&user()).unwrap()
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, body)
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn post_json_authed(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    pub async fn get_authed(&self, uri: &str) -> (StatusCode, Value) {
        self.send(
            Request::get(uri)
                .header(header::AUTHORIZATION, format!("Bearer {TOKEN}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
    }
}
