//! Stripe payment provider implementation

use std::collections::HashMap;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, instrument};

use routeplan_types::{PlanId, UserId};

use crate::config::BillingConfig;
use crate::error::BillingError;
use crate::provider::{CardDetails, CheckoutRequest, CheckoutSession, PaymentProvider};

/// Customer metadata key linking a Stripe customer to its user
pub const USER_ID_METADATA_KEY: &str = "clerk_user_id";

/// Stripe payment provider
#[derive(Clone)]
pub struct StripeProvider {
    client: Client,
    config: BillingConfig,
}

impl std::fmt::Debug for StripeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeProvider")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl StripeProvider {
    /// Create a new Stripe provider
    pub fn new(config: BillingConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self { client, config }
    }

    /// Make authenticated request to Stripe.
    ///
    /// Parameters go in the query string for GET and DELETE, and as a form
    /// body otherwise.
    async fn stripe_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: Option<&[(&str, &str)]>,
    ) -> Result<T, BillingError> {
        let url = format!("{}{endpoint}", self.config.api_base);
        let sends_query = method == Method::GET || method == Method::DELETE;

        let mut request = self
            .client
            .request(method, &url)
            .basic_auth(&self.config.stripe_secret_key, Option::<&str>::None);

        if let Some(params) = params {
            request = if sends_query {
                request.query(params)
            } else {
                request.form(params)
            };
        }

        let response = request.send().await.map_err(|e| {
            error!(error = %e, "Stripe API request failed");
            BillingError::ProviderError(e.to_string())
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %error_body, "Stripe API error");
            let message = serde_json::from_str::<StripeErrorBody>(&error_body)
                .ok()
                .and_then(|b| b.error.message)
                .unwrap_or_else(|| format!("Stripe API error: {status}"));
            return Err(BillingError::ProviderError(message));
        }

        response.json::<T>().await.map_err(|e| {
            error!(error = %e, "Failed to parse Stripe response");
            BillingError::Internal(e.to_string())
        })
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    #[instrument(skip(self, email, name), fields(user_id = %user_id))]
    async fn create_customer(
        &self,
        email: &str,
        name: Option<&str>,
        user_id: &UserId,
    ) -> Result<StripeCustomer, BillingError> {
        debug!("Creating Stripe customer");

        let metadata_key = format!("metadata[{USER_ID_METADATA_KEY}]");
        let mut form: Vec<(&str, &str)> =
            vec![("email", email), (metadata_key.as_str(), user_id.as_str())];
        if let Some(n) = name {
            form.push(("name", n));
        }

        self.stripe_request(Method::POST, "/customers", Some(&form))
            .await
    }

    #[instrument(skip(self, email))]
    async fn find_customers_by_email(
        &self,
        email: &str,
    ) -> Result<Vec<StripeCustomer>, BillingError> {
        let list: StripeList<StripeCustomer> = self
            .stripe_request(Method::GET, "/customers", Some(&[("email", email)]))
            .await?;
        Ok(list.data)
    }

    #[instrument(skip(self))]
    async fn get_customer(&self, customer_id: &str) -> Result<StripeCustomer, BillingError> {
        debug!(customer_id = %customer_id, "Getting Stripe customer");

        self.stripe_request(Method::GET, &format!("/customers/{customer_id}"), None)
            .await
    }

    #[instrument(skip(self, request), fields(customer_id = %request.customer_id, price_id = %request.price_id))]
    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, BillingError> {
        debug!(trial_days = ?request.trial_days, "Creating checkout session");

        let trial_days = request.trial_days.map(|d| d.to_string());
        let mut form: Vec<(&str, &str)> = vec![
            ("customer", request.customer_id.as_str()),
            ("mode", "subscription"),
            ("payment_method_types[0]", "card"),
            ("line_items[0][price]", request.price_id.as_str()),
            ("line_items[0][quantity]", "1"),
            ("allow_promotion_codes", "true"),
            ("success_url", request.success_url.as_str()),
            ("cancel_url", request.cancel_url.as_str()),
        ];
        if let Some(days) = trial_days.as_deref() {
            form.push(("subscription_data[trial_period_days]", days));
        }

        let session: StripeCheckoutSession = self
            .stripe_request(Method::POST, "/checkout/sessions", Some(&form))
            .await?;

        Ok(CheckoutSession {
            session_id: session.id,
            url: session.url,
        })
    }

    #[instrument(skip(self))]
    async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: &str,
    ) -> Result<String, BillingError> {
        debug!(customer_id = %customer_id, "Creating portal session");

        let form = [("customer", customer_id), ("return_url", return_url)];

        let session: StripeBillingPortalSession = self
            .stripe_request(Method::POST, "/billing_portal/sessions", Some(&form))
            .await?;

        Ok(session.url)
    }

    #[instrument(skip(self))]
    async fn get_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        debug!(subscription_id = %subscription_id, "Getting Stripe subscription");

        self.stripe_request(
            Method::GET,
            &format!("/subscriptions/{subscription_id}"),
            None,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn cancel_subscription(
        &self,
        subscription_id: &str,
    ) -> Result<StripeSubscription, BillingError> {
        debug!(subscription_id = %subscription_id, "Canceling subscription");

        self.stripe_request(
            Method::DELETE,
            &format!("/subscriptions/{subscription_id}"),
            None,
        )
        .await
    }

    #[instrument(skip(self))]
    async fn update_subscription_price(
        &self,
        subscription_id: &str,
        item_id: &str,
        price_id: &PlanId,
    ) -> Result<StripeSubscription, BillingError> {
        debug!("Updating subscription price");

        let form = [
            ("items[0][id]", item_id),
            ("items[0][price]", price_id.as_str()),
            ("proration_behavior", "create_prorations"),
            ("payment_behavior", "default_incomplete"),
            ("cancel_at_period_end", "false"),
        ];

        self.stripe_request(
            Method::POST,
            &format!("/subscriptions/{subscription_id}"),
            Some(&form),
        )
        .await
    }

    #[instrument(skip(self))]
    async fn get_invoice(&self, invoice_id: &str) -> Result<StripeInvoice, BillingError> {
        self.stripe_request(Method::GET, &format!("/invoices/{invoice_id}"), None)
            .await
    }

    #[instrument(skip(self))]
    async fn list_invoices(
        &self,
        customer_id: &str,
        limit: u32,
    ) -> Result<Vec<StripeInvoice>, BillingError> {
        debug!(customer_id = %customer_id, limit = %limit, "Listing invoices");

        let limit_str = limit.to_string();
        let params = [("customer", customer_id), ("limit", limit_str.as_str())];

        let list: StripeList<StripeInvoice> = self
            .stripe_request(Method::GET, "/invoices", Some(&params))
            .await?;
        Ok(list.data)
    }

    #[instrument(skip(self))]
    async fn default_card(&self, customer_id: &str) -> Result<Option<CardDetails>, BillingError> {
        let list: StripeList<StripePaymentMethod> = self
            .stripe_request(
                Method::GET,
                &format!("/customers/{customer_id}/payment_methods"),
                Some(&[("type", "card"), ("limit", "1")]),
            )
            .await?;

        Ok(list.data.into_iter().next().and_then(|pm| pm.card))
    }
}

// Stripe API response types

/// Stripe customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCustomer {
    /// Customer ID
    pub id: String,
    /// Customer email
    pub email: Option<String>,
    /// Customer name
    pub name: Option<String>,
    /// Whether the customer is deleted
    #[serde(default)]
    pub deleted: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl StripeCustomer {
    /// Owning user, from customer metadata
    pub fn user_id(&self) -> Option<&str> {
        self.metadata
            .get(USER_ID_METADATA_KEY)
            .map(String::as_str)
            .filter(|id| !id.is_empty())
    }
}

/// Stripe subscription
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscription {
    /// Subscription ID
    pub id: String,
    /// Customer ID
    pub customer: String,
    /// Subscription status
    pub status: String,
    /// Current period start (Unix timestamp). Newer API versions report it
    /// per item instead.
    #[serde(default)]
    pub current_period_start: Option<i64>,
    /// End of the trial (Unix timestamp)
    #[serde(default)]
    pub trial_end: Option<i64>,
    /// Whether subscription cancels at period end
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub latest_invoice: Option<String>,
    #[serde(default)]
    pub items: StripeList<StripeSubscriptionItem>,
}

impl StripeSubscription {
    fn first_item(&self) -> Option<&StripeSubscriptionItem> {
        self.items.data.first()
    }

    /// Price of the first item, which is the plan
    pub fn plan_id(&self) -> Option<PlanId> {
        self.first_item().map(|item| PlanId::new(item.price.id.as_str()))
    }

    pub fn item_id(&self) -> Option<&str> {
        self.first_item().map(|item| item.id.as_str())
    }

    pub fn period_start(&self) -> Option<i64> {
        self.current_period_start
            .or_else(|| self.first_item().and_then(|item| item.current_period_start))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscriptionItem {
    pub id: String,
    pub price: StripePrice,
    #[serde(default)]
    pub current_period_start: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePrice {
    pub id: String,
}

/// Stripe checkout session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeCheckoutSession {
    /// Session ID
    pub id: String,
    /// Checkout URL
    pub url: Option<String>,
    /// Customer ID
    pub customer: Option<String>,
    /// Subscription ID (after completion)
    pub subscription: Option<String>,
    /// Checkout mode (`subscription`, `payment`, `setup`)
    #[serde(default)]
    pub mode: Option<String>,
}

/// Stripe billing portal session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeBillingPortalSession {
    /// Session ID
    pub id: String,
    /// Portal URL
    pub url: String,
}

/// Stripe invoice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoice {
    /// Invoice ID
    pub id: String,
    /// Customer ID
    pub customer: Option<String>,
    /// Human-readable invoice number
    #[serde(default)]
    pub number: Option<String>,
    /// Invoice status
    pub status: Option<String>,
    /// Amount due in cents
    #[serde(default)]
    pub amount_due: i64,
    /// Amount paid in cents
    #[serde(default)]
    pub amount_paid: i64,
    /// Currency
    #[serde(default)]
    pub currency: String,
    /// Creation time (Unix timestamp)
    #[serde(default)]
    pub created: i64,
    /// Hosted invoice URL
    pub hosted_invoice_url: Option<String>,
    /// Invoice PDF URL
    pub invoice_pdf: Option<String>,
    /// Subscription the invoice bills (older API versions)
    #[serde(default)]
    pub subscription: Option<String>,
    #[serde(default)]
    pub payment_intent: Option<String>,
    /// Billing parent (newer API versions)
    #[serde(default)]
    pub parent: Option<StripeInvoiceParent>,
}

impl StripeInvoice {
    pub fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| d.subscription.as_deref())
        })
    }

    pub fn is_open(&self) -> bool {
        self.status.as_deref() == Some("open")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeInvoiceParent {
    #[serde(default)]
    pub subscription_details: Option<StripeSubscriptionDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeSubscriptionDetails {
    #[serde(default)]
    pub subscription: Option<String>,
}

/// Stripe payment method
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripePaymentMethod {
    pub id: String,
    #[serde(default)]
    pub card: Option<CardDetails>,
}

/// Stripe list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StripeList<T> {
    /// List data
    pub data: Vec<T>,
    /// Whether there are more items
    #[serde(default)]
    pub has_more: bool,
}

impl<T> Default for StripeList<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            has_more: false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    message: Option<String>,
}
