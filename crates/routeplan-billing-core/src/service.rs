//! Billing service
//!
//! Ties the payment provider, the profile store and plan policy together.
//! Every profile write goes through [`update_profile`], so concurrent
//! webhooks and requests for the same user cannot overwrite each other.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};

use routeplan_identity::{update_profile, ProfileStore};
use routeplan_types::{PendingPayment, PlanId, UserId, UserSubscriptionProfile};

use crate::policy::{check_stop_limit, check_usage_limit, resolve_limits};
use crate::provider::{CardDetails, CheckoutRequest, CheckoutSession, PaymentProvider};
use crate::reconciler::{transition, BillingEvent, SubscriptionSnapshot};
use crate::stripe::{StripeCustomer, StripeInvoice};
use crate::webhook::{WebhookEvent, WebhookEventData, WebhookEventType, WebhookHandler};
use crate::{BillingConfig, BillingError};

/// Invoices shown in billing history
const BILLING_HISTORY_LIMIT: u32 = 10;

/// Billing service
#[derive(Clone)]
pub struct BillingService {
    provider: Arc<dyn PaymentProvider>,
    profiles: Arc<dyn ProfileStore>,
    webhooks: WebhookHandler,
    config: BillingConfig,
}

impl std::fmt::Debug for BillingService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingService")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// An optimization let through by plan policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Admission {
    pub plan: String,
    /// Usage after this optimization was counted
    pub optimizations_used: u32,
}

/// Result of a plan change request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpgradeOutcome {
    /// The requested plan is the current one
    AlreadySubscribed,
    Updated {
        subscription_id: String,
        new_plan_id: PlanId,
        plan_name: String,
        subscription_status: String,
        /// Set when the proration invoice is open and must be paid by hand
        hosted_invoice_url: Option<String>,
    },
}

/// One row of billing history
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvoiceSummary {
    pub id: String,
    pub number: Option<String>,
    pub amount_due: i64,
    pub amount_paid: i64,
    pub currency: String,
    pub created: i64,
    pub status: Option<String>,
    pub invoice_pdf: Option<String>,
}

impl From<StripeInvoice> for InvoiceSummary {
    fn from(invoice: StripeInvoice) -> Self {
        Self {
            id: invoice.id,
            number: invoice.number,
            amount_due: invoice.amount_due,
            amount_paid: invoice.amount_paid,
            currency: invoice.currency,
            created: invoice.created,
            status: invoice.status,
            invoice_pdf: invoice.invoice_pdf,
        }
    }
}

impl BillingService {
    pub fn new(
        provider: Arc<dyn PaymentProvider>,
        profiles: Arc<dyn ProfileStore>,
        config: BillingConfig,
    ) -> Self {
        let webhooks = WebhookHandler::new(config.stripe_webhook_secret.clone());
        Self {
            provider,
            profiles,
            webhooks,
            config,
        }
    }

    pub fn config(&self) -> &BillingConfig {
        &self.config
    }

    pub fn publishable_key(&self) -> Option<&str> {
        self.config.stripe_publishable_key.as_deref()
    }

    // ========================================================================
    // Usage gating
    // ========================================================================

    /// Check plan limits and count one optimization.
    ///
    /// The check and the increment are one versioned write, retried as a
    /// whole on conflict. The unit is consumed before routing starts, so a
    /// routing failure still counts.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn admit_optimization(
        &self,
        user_id: &UserId,
        via_count: usize,
    ) -> Result<Admission, BillingError> {
        let catalog = &self.config.plans;

        let result = update_profile::<_, BillingError, _>(self.profiles.as_ref(), user_id, |profile| {
            let limits = resolve_limits(catalog, &profile.state);
            check_stop_limit(&limits, via_count)?;
            check_usage_limit(&limits, profile.optimizations_used())?;

            let Some(cycle) = profile.state.cycle_mut() else {
                return Err(BillingError::Internal(
                    "admitted profile has no plan cycle".to_string(),
                ));
            };
            if cycle.cycle_start.is_none() {
                warn!("Active plan has no cycle start; counting as a fresh cycle");
            }
            cycle.optimizations_used = cycle.optimizations_used.saturating_add(1);

            Ok(Admission {
                plan: limits.name,
                optimizations_used: cycle.optimizations_used,
            })
        })
        .await;

        match result {
            Ok((_, admission)) => {
                debug!(plan = %admission.plan, used = admission.optimizations_used, "Optimization admitted");
                Ok(admission)
            }
            Err(BillingError::QuotaExceeded(rejection)) => {
                info!(limit = rejection.limit.as_str(), plan = %rejection.plan, "Optimization rejected by plan policy");
                metrics::counter!("routeplan_quota_rejections_total", "limit" => rejection.limit.as_str())
                    .increment(1);
                Err(BillingError::QuotaExceeded(rejection))
            }
            Err(e) => Err(e),
        }
    }

    // ========================================================================
    // Customers and checkout
    // ========================================================================

    /// Create a Stripe customer for the user and link it to the profile
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_customer(&self, user_id: &UserId) -> Result<String, BillingError> {
        let contact = self.profiles.contact(user_id).await?;
        let email = contact.email.ok_or(BillingError::MissingEmail)?;

        let customer = self
            .provider
            .create_customer(&email, contact.name.as_deref(), user_id)
            .await?;
        self.link_customer(user_id, &customer.id).await?;

        info!(customer_id = %customer.id, "Stripe customer created");
        Ok(customer.id)
    }

    /// Start a subscription checkout for a catalog plan
    #[instrument(skip(self), fields(user_id = %user_id, price_id = %price_id))]
    pub async fn create_checkout(
        &self,
        user_id: &UserId,
        price_id: &PlanId,
    ) -> Result<CheckoutSession, BillingError> {
        if !self.config.plans.contains(price_id) {
            return Err(BillingError::UnknownPlan(price_id.to_string()));
        }

        let profile = self.profiles.load(user_id).await?;
        let customer_id = self.resolve_customer(user_id, &profile).await?;

        let trial_days = (!profile.has_had_free_trial && self.config.trial_days > 0)
            .then_some(self.config.trial_days);

        let session = self
            .provider
            .create_checkout_session(&CheckoutRequest {
                customer_id,
                price_id: price_id.clone(),
                trial_days,
                success_url: self.config.success_url(),
                cancel_url: self.config.cancel_url(),
            })
            .await?;

        metrics::counter!("routeplan_checkouts_created_total").increment(1);
        info!(session_id = %session.session_id, trial = trial_days.is_some(), "Checkout session created");
        Ok(session)
    }

    /// Customer lookup order: profile, then Stripe by email and metadata,
    /// then a new customer.
    async fn resolve_customer(
        &self,
        user_id: &UserId,
        profile: &UserSubscriptionProfile,
    ) -> Result<String, BillingError> {
        if let Some(id) = &profile.stripe_customer_id {
            return Ok(id.clone());
        }

        let contact = self.profiles.contact(user_id).await?;
        let email = contact.email.ok_or(BillingError::MissingEmail)?;

        let existing = self
            .provider
            .find_customers_by_email(&email)
            .await?
            .into_iter()
            .find(|c| !c.deleted && c.user_id() == Some(user_id.as_str()));

        let customer: StripeCustomer = match existing {
            Some(customer) => {
                debug!(customer_id = %customer.id, "Found existing Stripe customer");
                customer
            }
            None => {
                self.provider
                    .create_customer(&email, contact.name.as_deref(), user_id)
                    .await?
            }
        };

        self.link_customer(user_id, &customer.id).await?;
        Ok(customer.id)
    }

    async fn link_customer(&self, user_id: &UserId, customer_id: &str) -> Result<(), BillingError> {
        update_profile::<_, BillingError, _>(self.profiles.as_ref(), user_id, |profile| {
            profile.stripe_customer_id = Some(customer_id.to_string());
            Ok(())
        })
        .await?;
        Ok(())
    }

    /// Billing portal URL for the user's customer
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn create_portal(&self, user_id: &UserId) -> Result<String, BillingError> {
        let customer_id = self.customer_id(user_id).await?;
        self.provider
            .create_portal_session(&customer_id, &self.config.portal_return_url())
            .await
    }

    async fn customer_id(&self, user_id: &UserId) -> Result<String, BillingError> {
        self.profiles
            .load(user_id)
            .await?
            .stripe_customer_id
            .ok_or(BillingError::CustomerNotFound)
    }

    // ========================================================================
    // Subscription management
    // ========================================================================

    /// Cancel immediately and return the provider's final status
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn cancel_subscription(&self, user_id: &UserId) -> Result<String, BillingError> {
        let profile = self.profiles.load(user_id).await?;
        let subscription_id = profile
            .state
            .subscription_id()
            .ok_or(BillingError::SubscriptionNotFound)?
            .to_string();

        let canceled = self.provider.cancel_subscription(&subscription_id).await?;
        let event = BillingEvent::SubscriptionDeleted(SubscriptionSnapshot::from(&canceled));
        self.apply(user_id, &event).await?;

        info!(subscription_id = %canceled.id, status = %canceled.status, "Subscription canceled");
        Ok(canceled.status)
    }

    /// Move to a higher plan. Downgrades go through support.
    #[instrument(skip(self), fields(user_id = %user_id, new_price_id = %new_price_id))]
    pub async fn upgrade_subscription(
        &self,
        user_id: &UserId,
        new_price_id: &PlanId,
    ) -> Result<UpgradeOutcome, BillingError> {
        let profile = self.profiles.load(user_id).await?;
        let subscription_id = profile
            .state
            .subscription_id()
            .ok_or(BillingError::SubscriptionNotFound)?
            .to_string();
        let current_plan = profile.state.plan_id().ok_or_else(|| {
            error!(subscription_id = %subscription_id, "Subscription without a plan on the profile");
            BillingError::PlanConfiguration("current plan information is missing".to_string())
        })?;

        if current_plan == new_price_id {
            return Ok(UpgradeOutcome::AlreadySubscribed);
        }

        let current = self.config.plans.get(current_plan).ok_or_else(|| {
            error!(plan_id = %current_plan, "Current plan missing from catalog");
            BillingError::PlanConfiguration(format!("unknown current plan {current_plan}"))
        })?;
        let target = self
            .config
            .plans
            .get(new_price_id)
            .ok_or_else(|| BillingError::UnknownPlan(new_price_id.to_string()))?;

        if target.level < current.level {
            info!(from = %current_plan, "Downgrade refused");
            return Err(BillingError::DowngradeNotAllowed);
        }

        let existing = self.provider.get_subscription(&subscription_id).await?;
        let item_id = existing
            .item_id()
            .ok_or(BillingError::SubscriptionNotFound)?
            .to_string();

        let updated = self
            .provider
            .update_subscription_price(&subscription_id, &item_id, new_price_id)
            .await?;
        info!(status = %updated.status, "Subscription price updated");

        let open_invoice = match (updated.status.as_str(), updated.latest_invoice.as_deref()) {
            ("past_due" | "incomplete", Some(invoice_id)) => {
                match self.provider.get_invoice(invoice_id).await {
                    Ok(invoice) if invoice.is_open() && invoice.hosted_invoice_url.is_some() => {
                        Some(invoice)
                    }
                    Ok(invoice) => {
                        debug!(invoice_id = %invoice.id, status = ?invoice.status, "Upgrade invoice needs no redirect");
                        None
                    }
                    Err(e) => {
                        warn!(invoice_id = %invoice_id, error = %e, "Could not load upgrade invoice");
                        None
                    }
                }
            }
            _ => None,
        };

        let event = BillingEvent::SubscriptionChanged(SubscriptionSnapshot::from(&updated));
        let now = Utc::now().timestamp();
        let pending_invoice = open_invoice.as_ref().map(|inv| inv.id.clone());
        update_profile::<_, BillingError, _>(self.profiles.as_ref(), user_id, |profile| {
            *profile = transition(profile, &event, now);
            if let Some(invoice_id) = &pending_invoice {
                profile.pending_payment = Some(PendingPayment {
                    invoice_id: Some(invoice_id.clone()),
                    ..Default::default()
                });
            }
            Ok(())
        })
        .await?;

        Ok(UpgradeOutcome::Updated {
            subscription_id: updated.id,
            new_plan_id: new_price_id.clone(),
            plan_name: target.name.clone(),
            subscription_status: updated.status,
            hosted_invoice_url: open_invoice.and_then(|inv| inv.hosted_invoice_url),
        })
    }

    /// Recent invoices, newest first
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn billing_history(
        &self,
        user_id: &UserId,
    ) -> Result<Vec<InvoiceSummary>, BillingError> {
        let customer_id = self.customer_id(user_id).await?;
        let invoices = self
            .provider
            .list_invoices(&customer_id, BILLING_HISTORY_LIMIT)
            .await?;
        Ok(invoices.into_iter().map(InvoiceSummary::from).collect())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn payment_method(&self, user_id: &UserId) -> Result<Option<CardDetails>, BillingError> {
        let customer_id = self.customer_id(user_id).await?;
        self.provider.default_card(&customer_id).await
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn clear_pending_payment(&self, user_id: &UserId) -> Result<(), BillingError> {
        update_profile::<_, BillingError, _>(self.profiles.as_ref(), user_id, |profile| {
            profile.pending_payment = None;
            Ok(())
        })
        .await?;
        Ok(())
    }

    // ========================================================================
    // Webhooks
    // ========================================================================

    /// Verify and reconcile one webhook delivery.
    ///
    /// Only a bad signature or unparseable payload is an error. Processing
    /// failures are logged and counted, and the delivery is still
    /// acknowledged.
    #[instrument(skip_all)]
    pub async fn process_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookEvent, BillingError> {
        let event = self.webhooks.verify_and_parse(payload, signature)?;

        let status = match self.reconcile(&event).await {
            Ok(true) => "processed",
            Ok(false) => "ignored",
            Err(e) => {
                if event.event_type.is_critical() {
                    error!(event_id = %event.id, event_type = ?event.event_type, error = %e, "Critical webhook not reconciled");
                } else {
                    warn!(event_id = %event.id, event_type = ?event.event_type, error = %e, "Webhook not reconciled");
                }
                "failed"
            }
        };
        metrics::counter!("routeplan_webhooks_processed_total", "status" => status).increment(1);

        Ok(event)
    }

    /// Apply an event to its user's profile. `Ok(false)` means nothing to do.
    async fn reconcile(&self, event: &WebhookEvent) -> Result<bool, BillingError> {
        let (customer_id, billing_event) = match (&event.event_type, &event.data) {
            (WebhookEventType::CheckoutSessionCompleted, WebhookEventData::CheckoutSession(session)) => {
                let (Some(customer_id), Some(subscription_id)) =
                    (&session.customer_id, &session.subscription_id)
                else {
                    warn!(session_id = %session.session_id, "Checkout session without customer or subscription");
                    return Ok(false);
                };
                if session.mode.as_deref().is_some_and(|m| m != "subscription") {
                    return Ok(false);
                }
                let subscription = self.provider.get_subscription(subscription_id).await?;
                (
                    customer_id.clone(),
                    BillingEvent::SubscriptionChanged(SubscriptionSnapshot::from(&subscription)),
                )
            }
            (
                WebhookEventType::CustomerSubscriptionCreated
                | WebhookEventType::CustomerSubscriptionUpdated,
                WebhookEventData::Subscription(subscription),
            ) => (
                subscription.customer.clone(),
                BillingEvent::SubscriptionChanged(SubscriptionSnapshot::from(subscription)),
            ),
            (WebhookEventType::CustomerSubscriptionDeleted, WebhookEventData::Subscription(subscription)) => (
                subscription.customer.clone(),
                BillingEvent::SubscriptionDeleted(SubscriptionSnapshot::from(subscription)),
            ),
            (
                WebhookEventType::InvoicePaid | WebhookEventType::InvoicePaymentSucceeded,
                WebhookEventData::Invoice(invoice),
            ) => {
                let (Some(customer_id), Some(subscription_id)) =
                    (&invoice.customer_id, &invoice.subscription_id)
                else {
                    debug!(invoice_id = %invoice.invoice_id, "Invoice not tied to a subscription");
                    return Ok(false);
                };
                let subscription = self.provider.get_subscription(subscription_id).await?;
                (
                    customer_id.clone(),
                    BillingEvent::InvoicePaid(SubscriptionSnapshot::from(&subscription)),
                )
            }
            (
                WebhookEventType::InvoicePaymentFailed
                | WebhookEventType::InvoicePaymentActionRequired,
                WebhookEventData::Invoice(invoice),
            ) => {
                let Some(customer_id) = &invoice.customer_id else {
                    return Ok(false);
                };
                (
                    customer_id.clone(),
                    BillingEvent::PaymentFailed {
                        invoice_id: invoice.invoice_id.clone(),
                        payment_intent_id: invoice.payment_intent_id.clone(),
                        action_required: event.event_type
                            == WebhookEventType::InvoicePaymentActionRequired,
                    },
                )
            }
            (event_type, _) => {
                debug!(event_type = ?event_type, "Unhandled webhook event type");
                return Ok(false);
            }
        };

        let user_id = self.user_for_customer(&customer_id).await?;
        self.apply(&user_id, &billing_event).await?;
        info!(event_id = %event.id, user_id = %user_id, "Webhook reconciled");
        Ok(true)
    }

    async fn user_for_customer(&self, customer_id: &str) -> Result<UserId, BillingError> {
        let customer = self.provider.get_customer(customer_id).await?;
        if customer.deleted {
            return Err(BillingError::CustomerNotFound);
        }
        let raw = customer.user_id().ok_or_else(|| {
            BillingError::Internal(format!("customer {customer_id} has no user id metadata"))
        })?;
        UserId::parse(raw).map_err(|e| BillingError::Internal(e.to_string()))
    }

    async fn apply(&self, user_id: &UserId, event: &BillingEvent) -> Result<(), BillingError> {
        let now = Utc::now().timestamp();
        update_profile::<_, BillingError, _>(self.profiles.as_ref(), user_id, |profile| {
            *profile = transition(profile, event, now);
            Ok(())
        })
        .await?;
        Ok(())
    }
}

