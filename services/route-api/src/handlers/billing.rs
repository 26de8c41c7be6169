//! Subscription and payment handlers

use std::time::Instant;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use routeplan_billing_core::{CardDetails, InvoiceSummary, UpgradeOutcome};
use routeplan_types::PlanId;

use crate::error::{ApiError, ApiResult};
use crate::extractors::AuthUser;
use crate::handlers::shared::{json_body, record_op_duration};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub price_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    pub session_id: String,
    pub url: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PortalResponse {
    pub url: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCustomerResponse {
    pub message: &'static str,
    pub stripe_customer_id: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub success: bool,
    pub subscription_status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    #[serde(default)]
    pub new_price_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requires_redirect_to_invoice: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hosted_invoice_url: Option<String>,
    pub message: String,
}

impl From<UpgradeOutcome> for UpdateSubscriptionResponse {
    fn from(outcome: UpgradeOutcome) -> Self {
        match outcome {
            UpgradeOutcome::AlreadySubscribed => Self {
                success: None,
                subscription_id: None,
                new_plan_id: None,
                subscription_status: None,
                requires_redirect_to_invoice: None,
                hosted_invoice_url: None,
                message: "User is already subscribed to this plan.".to_string(),
            },
            UpgradeOutcome::Updated {
                subscription_id,
                new_plan_id,
                plan_name,
                subscription_status,
                hosted_invoice_url,
            } => {
                let message = if hosted_invoice_url.is_some() {
                    "Subscription update requires payment. Please complete payment on the Stripe page.".to_string()
                } else if matches!(subscription_status.as_str(), "past_due" | "incomplete") {
                    format!(
                        "Subscription update to {plan_name} initiated. Status: {subscription_status}. Payment may be required."
                    )
                } else {
                    format!("Subscription successfully updated to {plan_name}.")
                };
                Self {
                    success: Some(true),
                    subscription_id: Some(subscription_id),
                    new_plan_id: Some(new_plan_id.to_string()),
                    subscription_status: Some(subscription_status),
                    requires_redirect_to_invoice: Some(hosted_invoice_url.is_some()),
                    hosted_invoice_url,
                    message,
                }
            }
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingHistoryResponse {
    pub billing_history: Vec<InvoiceSummary>,
}

/// Default card, or a message when the customer has none
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum PaymentMethodResponse {
    Card(CardDetails),
    Missing { message: &'static str },
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicConfigResponse {
    pub stripe_publishable_key: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /create-checkout-session
pub async fn create_checkout(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<CheckoutRequest>, JsonRejection>,
) -> ApiResult<Json<CheckoutResponse>> {
    let start = Instant::now();
    let req = json_body(payload)?;

    let price_id = req
        .price_id
        .filter(|p| !p.trim().is_empty())
        .map(PlanId::new)
        .ok_or_else(|| ApiError::Validation("Price ID is required".to_string()))?;

    let result = state.billing.create_checkout(&user, &price_id).await;
    record_op_duration("create_checkout", start, result.is_ok());
    let session = result?;

    Ok(Json(CheckoutResponse {
        session_id: session.session_id,
        url: session.url,
    }))
}

/// POST /create-customer-portal-session
pub async fn create_portal(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<PortalResponse>> {
    let start = Instant::now();

    let result = state.billing.create_portal(&user).await;
    record_op_duration("create_portal", start, result.is_ok());

    Ok(Json(PortalResponse { url: result? }))
}

/// POST /create-stripe-customer
pub async fn create_stripe_customer(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CreateCustomerResponse>> {
    let start = Instant::now();

    let result = state.billing.create_customer(&user).await;
    record_op_duration("create_customer", start, result.is_ok());

    Ok(Json(CreateCustomerResponse {
        message: "Stripe customer created successfully",
        stripe_customer_id: result?,
    }))
}

/// POST /cancel-subscription
pub async fn cancel_subscription(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<CancelResponse>> {
    let start = Instant::now();

    let result = state.billing.cancel_subscription(&user).await;
    record_op_duration("cancel_subscription", start, result.is_ok());

    Ok(Json(CancelResponse {
        success: true,
        subscription_status: result?,
    }))
}

/// POST /update-subscription
///
/// Upgrades only. Downgrades are refused with 403.
pub async fn update_subscription(
    State(state): State<AppState>,
    user: AuthUser,
    payload: Result<Json<UpdateSubscriptionRequest>, JsonRejection>,
) -> ApiResult<Json<UpdateSubscriptionResponse>> {
    let start = Instant::now();
    let req = json_body(payload)?;

    let new_price_id = req
        .new_price_id
        .filter(|p| !p.trim().is_empty())
        .map(PlanId::new)
        .ok_or_else(|| ApiError::Validation("Missing or invalid newPriceId".to_string()))?;

    let result = state.billing.upgrade_subscription(&user, &new_price_id).await;
    record_op_duration("update_subscription", start, result.is_ok());

    Ok(Json(result?.into()))
}

/// GET|POST /get-billing-history
pub async fn billing_history(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<BillingHistoryResponse>> {
    let start = Instant::now();

    let result = state.billing.billing_history(&user).await;
    record_op_duration("billing_history", start, result.is_ok());

    Ok(Json(BillingHistoryResponse {
        billing_history: result?,
    }))
}

/// GET|POST /get-payment-method
pub async fn payment_method(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<PaymentMethodResponse>> {
    let start = Instant::now();

    let result = state.billing.payment_method(&user).await;
    record_op_duration("payment_method", start, result.is_ok());

    Ok(Json(match result? {
        Some(card) => PaymentMethodResponse::Card(card),
        None => PaymentMethodResponse::Missing {
            message: "No payment methods found.",
        },
    }))
}

/// POST /clear-pending-payment-details
pub async fn clear_pending_payment(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<Json<MessageResponse>> {
    state.billing.clear_pending_payment(&user).await?;

    Ok(Json(MessageResponse {
        success: true,
        message: "Pending payment details cleared.",
    }))
}

/// GET /public-config
pub async fn public_config(State(state): State<AppState>) -> Json<PublicConfigResponse> {
    Json(PublicConfigResponse {
        stripe_publishable_key: state.billing.publishable_key().map(str::to_string),
    })
}
