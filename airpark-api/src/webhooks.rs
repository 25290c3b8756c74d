use airpark_booking::gateways::verify_stripe_signature;
use airpark_core::payment::PaymentMethod;
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StripeWebhook {
    pub id: String,
    #[serde(rename = "type")]
    pub type_: String,
    pub data: StripeWebhookData,
}

#[derive(Debug, Deserialize)]
pub struct StripeWebhookData {
    pub object: StripeObject,
}

#[derive(Debug, Deserialize)]
pub struct StripeObject {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct PayPalWebhook {
    pub id: String,
    pub event_type: String,
    pub resource: Value,
}

impl PayPalWebhook {
    /// Order id the event is about. Capture events carry it under `related_ids`.
    pub fn order_id(&self) -> Option<&str> {
        if self.event_type.starts_with("CHECKOUT.ORDER.") {
            self.resource["id"].as_str()
        } else {
            self.resource["supplementary_data"]["related_ids"]["order_id"].as_str()
        }
    }
}

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/webhooks/stripe", post(handle_stripe_webhook))
        .route("/v1/webhooks/paypal", post(handle_paypal_webhook))
}

/// POST /v1/webhooks/stripe
/// Receive payment status updates from Stripe
async fn handle_stripe_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // 1. Verify signature when a secret is configured
    if !state.webhooks.stripe_secret.is_empty() {
        let sig_header = headers
            .get("Stripe-Signature")
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| {
                AppError::ValidationError("Missing Stripe-Signature header".to_string())
            })?;

        let secret = &state.webhooks.stripe_secret;
        let now = Utc::now().timestamp();
        if let Err(reason) = verify_stripe_signature(&body, sig_header, secret, now) {
            tracing::warn!("Rejected Stripe webhook: {}", reason);
            return Err(AppError::ValidationError(reason.to_string()));
        }
    }

    let payload: StripeWebhook = serde_json::from_slice(&body)
        .map_err(|e| AppError::ValidationError(format!("Malformed Stripe event: {}", e)))?;
    tracing::info!(
        "Received Stripe webhook: {} for intent {}",
        payload.type_,
        payload.data.object.id
    );

    if !payload.type_.starts_with("payment_intent.") {
        return Ok((StatusCode::OK, Json(json!({ "received": true, "ignored": true }))));
    }

    let intent_id = &payload.data.object.id;
    process_event(&state, "stripe", &payload.id, PaymentMethod::Card, intent_id).await
}

/// POST /v1/webhooks/paypal
async fn handle_paypal_webhook(
    State(state): State<AppState>,
    Json(payload): Json<PayPalWebhook>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    tracing::info!("Received PayPal webhook: {} ({})", payload.event_type, payload.id);

    let relevant = payload.event_type.starts_with("CHECKOUT.ORDER.")
        || payload.event_type.starts_with("PAYMENT.CAPTURE.");
    let Some(order_id) = payload.order_id().filter(|_| relevant) else {
        return Ok((StatusCode::OK, Json(json!({ "received": true, "ignored": true }))));
    };

    process_event(&state, "paypal", &payload.id, PaymentMethod::PayPal, order_id).await
}

/// Claim the event, reconcile the booking against the gateway, give the claim
/// back if reconciliation failed so the provider retry gets processed.
async fn process_event(
    state: &AppState,
    provider: &str,
    event_id: &str,
    method: PaymentMethod,
    intent_id: &str,
) -> Result<(StatusCode, Json<Value>), AppError> {
    // 1. De-duplicate deliveries (fail open without Redis)
    if let Some(redis) = &state.redis {
        match redis
            .claim_webhook_event(provider, event_id, state.webhooks.dedupe_ttl_seconds)
            .await
        {
            Ok(false) => {
                return Ok((StatusCode::OK, Json(json!({ "received": true, "duplicate": true }))));
            }
            Ok(true) => {}
            Err(e) => tracing::warn!("Webhook de-duplication unavailable: {}", e),
        }
    }

    // 2. Reconcile via the service (idempotent on settled payments)
    match state.service.apply_gateway_update(method, intent_id).await {
        Ok(Some(booking)) => {
            state
                .metrics
                .payment(method.as_str(), &booking.payment_status.as_str().to_lowercase());
            tracing::info!(
                "Booking {} reconciled from {} event {}: {} / {}",
                booking.reference,
                provider,
                event_id,
                booking.status.as_str(),
                booking.payment_status.as_str()
            );
            Ok((
                StatusCode::OK,
                Json(json!({
                    "received": true,
                    "booking_id": booking.id,
                    "status": booking.status,
                    "payment_status": booking.payment_status,
                })),
            ))
        }
        Ok(None) => Ok((StatusCode::OK, Json(json!({ "received": true, "ignored": true })))),
        Err(e) => {
            if let Some(redis) = &state.redis {
                if let Err(release_err) = redis.release_webhook_event(provider, event_id).await {
                    tracing::warn!("Failed to release webhook claim {}: {}", event_id, release_err);
                }
            }
            Err(e.into())
        }
    }
}
