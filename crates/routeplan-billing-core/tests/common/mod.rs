//! Shared fakes for routeplan-billing-core integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use routeplan_billing_core::stripe::{
    StripeList, StripePrice, StripeSubscriptionItem,
};
use routeplan_billing_core::{
    BillingConfig, BillingError, BillingService, CardDetails, CheckoutRequest, CheckoutSession,
    PaymentProvider, StripeCustomer, StripeInvoice, StripeSubscription, USER_ID_METADATA_KEY,
};
use routeplan_identity::InMemoryProfileStore;
use routeplan_types::{PlanId, UserContact, UserId};

pub const WEBHOOK_SECRET: &str = "whsec_test_secret";
pub const PERIOD_START: i64 = 1_700_000_000;

pub fn user() -> UserId {
    UserId::parse("user_2abc").unwrap()
}

pub fn contact() -> UserContact {
    UserContact {
        email: Some("driver@example.com".to_string()),
        name: Some("Dana Driver".to_string()),
    }
}

pub fn stripe_customer(id: &str, user_id: &str) -> StripeCustomer {
    StripeCustomer {
        id: id.to_string(),
        email: Some("driver@example.com".to_string()),
        name: None,
        deleted: false,
        metadata: HashMap::from([(USER_ID_METADATA_KEY.to_string(), user_id.to_string())]),
    }
}

pub fn stripe_subscription(id: &str, customer: &str, plan: &str, status: &str) -> StripeSubscription {
    StripeSubscription {
        id: id.to_string(),
        customer: customer.to_string(),
        status: status.to_string(),
        current_period_start: Some(PERIOD_START),
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

/// In-memory payment provider that records what it was asked to do
#[derive(Default)]
pub struct MockPaymentProvider {
    pub customers: Mutex<HashMap<String, StripeCustomer>>,
    pub subscriptions: Mutex<HashMap<String, StripeSubscription>>,
    pub invoices: Mutex<HashMap<String, StripeInvoice>>,
    pub cards: Mutex<HashMap<String, CardDetails>>,
    pub checkouts: Mutex<Vec<CheckoutRequest>>,
    /// Status and latest invoice reported after a price change
    pub update_result: Mutex<Option<(String, Option<String>)>>,
    pub customers_created: AtomicU32,
}

impl MockPaymentProvider {
    pub fn with_customer(self, customer: StripeCustomer) -> Self {
        self.customers
            .lock()
            .unwrap()
            .insert(customer.id.clone(), customer);
        self
    }

    pub fn with_subscription(self, subscription: StripeSubscription) -> Self {
        self.subscriptions
            .lock()
            .unwrap()
            .insert(subscription.id.clone(), subscription);
        self
    }

    pub fn with_invoice(self, invoice: StripeInvoice) -> Self {
        self.invoices
            .lock()
            .unwrap()
            .insert(invoice.id.clone(), invoice);
        self
    }

    pub fn with_card(self, customer_id: &str, card: CardDetails) -> Self {
        self.cards
            .lock()
            .unwrap()
            .insert(customer_id.to_string(), card);
        self
    }

    pub fn with_update_result(self, status: &str, latest_invoice: Option<&str>) -> Self {
        *self.update_result.lock().unwrap() =
            Some((status.to_string(), latest_invoice.map(str::to_string)));
        self
    }

    pub fn checkouts(&self) -> Vec<CheckoutRequest> {
        self.checkouts.lock().unwrap().clone()
    }

    pub fn subscription(&self, id: &str) -> Option<StripeSubscription> {
        self.subscriptions.lock().unwrap().get(id).cloned()
    }

    fn not_found(what: &str, id: &str) -> BillingError {
        BillingError::ProviderError(format!("No such {what}: '{id}'"))
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: &UserId,
    ) -> Result<StripeCustomer, BillingError> {
        let n = self.customers_created.fetch_add(1, Ordering::SeqCst) + 1;
        let mut customer = stripe_customer(&format!("cus_new{n}"), user_id.as_str());
        customer.email = Some(email.to_string());
        customer.name = name.map(str::to_string);
        self.customers
            .lock()
            .unwrap()
            .insert(customer.id.clone(), customer.clone());
        Ok(customer)
    }

    async fn find_customers_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<StripeCustomer>, BillingError> {
        Ok(self
            .customers
            .lock()
            .unwrap()
            .values()
            .filter(|c| c.email.as_deref() == Some(email))
            .cloned()
            .collect())
    }

    async fn get_customer(&self, customer_id: &str) -> Result<StripeCustomer, BillingError> {
        self.customers
            .lock()
            .unwrap()
            .get(customer_id)
            .cloned()
            .ok_or_else(|| Self::not_found("customer", customer_id))
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        let mut checkouts = self.checkouts.lock().unwrap();
        checkouts.push(request.clone());
        Ok(CheckoutSession {
            session_id: format!("cs_test_{}", checkouts.len()),
            url: Some("https://checkout.stripe.com/c/pay/cs_test".to_string()),
        })
    }

    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError> {
        Ok(format!(
            "https://billing.stripe.com/p/session/{customer_id}?return={return_url}"
        ))
    }

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        self.subscription(subscription_id)
            .ok_or_else(|| Self::not_found("subscription", subscription_id))
    }

    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs
            .get_mut(subscription_id)
            .ok_or_else(|| Self::not_found("subscription", subscription_id))?;
        sub.status = "canceled".to_string();
        Ok(sub.clone())
    }

    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &PlanId,
    ) -> Result<StripeSubscription, BillingError> {
        let update_result = self.update_result.lock().unwrap().clone();
        let mut subs = self.subscriptions.lock().unwrap();
        let sub = subs
            .get_mut(subscription_id)
            .ok_or_else(|| Self::not_found("subscription", subscription_id))?;
        let item = sub
            .items
            .data
            .iter_mut()
            .find(|i| i.id == item_id)
            .ok_or_else(|| Self::not_found("subscription item", item_id))?;
        item.price.id = price_id.to_string();
        if let Some((status, latest_invoice)) = update_result {
            sub.status = status;
            sub.latest_invoice = latest_invoice;
        }
        Ok(sub.clone())
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<StripeInvoice, BillingError> {
        self.invoices
            .lock()
            .unwrap()
            .get(invoice_id)
            .cloned()
            .ok_or_else(|| Self::not_found("invoice", invoice_id))
    }

    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeInvoice>, BillingError> {
        let mut invoices: Vec<StripeInvoice> = self
            .invoices
            .lock()
            .unwrap()
            .values()
            .filter(|i| i.customer.as_deref() == Some(customer_id))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.created.cmp(&a.created));
        invoices.truncate(limit as usize);
        Ok(invoices)
    }

    async fn default_card(&self, customer_id: &str) -> Result<Option<CardDetails>, BillingError> {
        Ok(self.cards.lock().unwrap().get(customer_id).cloned())
    }
}

pub fn invoice(id: &str, customer: &str, status: &str, created: i64) -> StripeInvoice {
    StripeInvoice {
        id: id.to_string(),
        customer: Some(customer.to_string()),
        number: Some(format!("RP-{id}")),
        status: Some(status.to_string()),
        amount_due: 1499,
        amount_paid: if status == "paid" { 1499 } else { 0 },
        currency: "usd".to_string(),
        created,
        hosted_invoice_url: Some(format!("https://invoice.stripe.com/i/{id}")),
        invoice_pdf: Some(format!("https://pay.stripe.com/invoice/{id}/pdf")),
        subscription: None,
        payment_intent: None,
        parent: None,
    }
}

/// Service wired to fakes, with the test user registered
pub fn service(provider: MockPaymentProvider) -> (BillingService, Arc<MockPaymentProvider>, InMemoryProfileStore) {
    let provider = Arc::new(provider);
    let store = InMemoryProfileStore::new();
    store.insert_user(user(), contact());
    let config = BillingConfig::new("sk_test", WEBHOOK_SECRET).with_app_url("https://app.test");
    let service = BillingService::new(provider.clone(), Arc::new(store.clone()), config);
    (service, provider, store)
}
