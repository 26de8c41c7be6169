//! Payment provider abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use routeplan_types::{PlanId, UserId};

use crate::stripe::{StripeCustomer, StripeInvoice, StripeSubscription};
use crate::BillingError;

/// Payment provider trait
///
/// Abstracts payment processing so the billing service can run against
/// Stripe or an in-memory fake.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Create a customer tagged with the owning user id
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: &UserId,
    ) -> Result<StripeCustomer, BillingError>;

    /// Customers registered under an email address
    async fn find_customers_by_email(&self, email: &str)
        -> Result<Vec<StripeCustomer>, BillingError>;

    async fn get_customer(&self, customer_id: &str) -> Result<StripeCustomer, BillingError>;

    /// Create a subscription checkout session
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError>;

    /// Create a customer portal session and return its URL
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError>;

    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError>;

    /// Cancel a subscription immediately
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError>;

    /// Swap the price on a subscription item, prorating the difference
    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &PlanId,
    ) -> Result<StripeSubscription, BillingError>;

    async fn get_invoice(&self, invoice_id: &str) -> Result<StripeInvoice, BillingError>;

    /// Most recent invoices first
    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeInvoice>, BillingError>;

    /// First card on file, if any
    async fn default_card(&self, customer_id: &str) -> Result<Option<CardDetails>, BillingError>;
}

/// Parameters for a subscription checkout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: PlanId,
    /// Trial granted with the subscription, if any
    pub trial_days: Option<u32>,
    pub success_url: String,
    pub cancel_url: String,
}

/// Checkout session handed back to the browser
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: Option<String>,
}

/// Card summary shown on the account page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardDetails {
    pub brand: String,
    pub last4: String,
    pub exp_month: u32,
    pub exp_year: u32,
}
