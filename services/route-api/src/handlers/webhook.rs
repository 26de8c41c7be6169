//! Stripe webhook handler

use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::handlers::shared::record_op_duration;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
}

/// POST /stripe-webhooks
///
/// The raw body is needed for signature verification, so it is taken as
/// bytes. Anything past verification is acknowledged with 200; only a
/// missing or bad signature is a 400.
pub async fn stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let start = Instant::now();

    // Extract Stripe signature header
    let Some(sig_header) = headers.get("stripe-signature") else {
        tracing::warn!("Missing Stripe-Signature header");
        return Err(ApiError::Validation(
            "Webhook Error: missing Stripe-Signature header".to_string(),
        ));
    };

    let Ok(signature) = sig_header.to_str() else {
        tracing::warn!("Invalid Stripe-Signature header encoding");
        return Err(ApiError::Validation(
            "Webhook Error: invalid Stripe-Signature header".to_string(),
        ));
    };

    let result = state.billing.process_webhook(&body, signature).await;
    record_op_duration("process_webhook", start, result.is_ok());

    let event = result.map_err(|e| {
        tracing::warn!(error = %e, "Webhook rejected");
        ApiError::from(e)
    })?;
    tracing::debug!(event_id = %event.id, "Webhook acknowledged");

    Ok(Json(WebhookAck { received: true }))
}
