use airpark_core::payment::{PaymentAdapter, PaymentIntent, PaymentStatus};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use serde_json::Value;
use sha2::Sha256;
use uuid::Uuid;

const STRIPE_API: &str = "https://api.stripe.com/v1";

/// Seconds a webhook timestamp may drift before it is treated as a replay
pub const SIGNATURE_TOLERANCE_SECS: i64 = 300;

/// Card payments through Stripe PaymentIntents with manual capture
pub struct StripeAdapter {
    client: reqwest::Client,
    secret_key: String,
    base_url: String,
}

impl StripeAdapter {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_base_url(secret_key, STRIPE_API)
    }

    pub fn with_base_url(secret_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            secret_key: secret_key.into(),
            base_url: base_url.into(),
        }
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let response = request.basic_auth(&self.secret_key, None::<&str>).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body["error"]["message"].as_str().unwrap_or("unknown error");
            return Err(format!("Stripe returned {}: {}", status, message).into());
        }
        Ok(body)
    }
}

pub fn map_stripe_status(status: &str) -> PaymentStatus {
    match status {
        "requires_payment_method" => PaymentStatus::RequiresPaymentMethod,
        "requires_confirmation" | "requires_action" => PaymentStatus::RequiresAction,
        "processing" | "requires_capture" => PaymentStatus::Processing,
        "succeeded" => PaymentStatus::Succeeded,
        "canceled" => PaymentStatus::Canceled,
        _ => PaymentStatus::Failed,
    }
}

fn intent_from_json(
    body: &Value,
) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
    let id = body["id"].as_str().ok_or("Stripe intent without id")?.to_string();
    let booking_id = body["metadata"]["booking_id"]
        .as_str()
        .map(Uuid::parse_str)
        .transpose()?
        .ok_or("Stripe intent without booking_id metadata")?;

    Ok(PaymentIntent {
        id,
        booking_id,
        amount_pence: body["amount"].as_i64().unwrap_or(0),
        currency: body["currency"].as_str().unwrap_or("gbp").to_uppercase(),
        status: map_stripe_status(body["status"].as_str().unwrap_or("")),
        client_secret: body["client_secret"].as_str().map(String::from),
        approval_url: None,
        created_at: body["created"]
            .as_i64()
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl PaymentAdapter for StripeAdapter {
    fn name(&self) -> &'static str {
        "stripe"
    }

    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount_pence: i64,
        currency: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let amount = amount_pence.to_string();
        let currency = currency.to_lowercase();
        let booking = booking_id.to_string();

        let body = self
            .send(self.client.post(format!("{}/payment_intents", self.base_url)).form(&[
                ("amount", amount.as_str()),
                ("currency", currency.as_str()),
                ("capture_method", "manual"),
                ("automatic_payment_methods[enabled]", "true"),
                ("metadata[booking_id]", booking.as_str()),
            ]))
            .await?;

        intent_from_json(&body)
    }

    async fn get_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let body = self
            .send(self.client.get(format!("{}/payment_intents/{}", self.base_url, intent_id)))
            .await?;
        intent_from_json(&body)
    }

    async fn capture_payment(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let current = self.get_intent(intent_id).await?;
        if current.status != PaymentStatus::Processing {
            // Nothing authorized yet, or already settled
            return Ok(current);
        }

        let url = format!("{}/payment_intents/{}/capture", self.base_url, intent_id);
        let body = self.send(self.client.post(url)).await?;
        intent_from_json(&body)
    }

    async fn refund_payment(
        &self,
        intent_id: &str,
        amount_pence: i64,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>> {
        let amount = amount_pence.to_string();
        let body = self
            .send(self.client.post(format!("{}/refunds", self.base_url)).form(&[
                ("payment_intent", intent_id),
                ("amount", amount.as_str()),
            ]))
            .await?;

        match body["status"].as_str() {
            Some("succeeded") | Some("pending") => Ok(PaymentStatus::Refunded),
            other => Err(format!("Stripe refund for {} ended as {:?}", intent_id, other).into()),
        }
    }
}

/// Verify a `Stripe-Signature` header (HMAC-SHA256 over `"{t}.{payload}"`)
pub fn verify_stripe_signature(
    payload: &[u8],
    sig_header: &str,
    secret: &str,
    now: i64,
) -> Result<(), &'static str> {
    let mut timestamp = "";
    let mut signatures = Vec::new();
    for part in sig_header.split(',') {
        let part = part.trim();
        if let Some(t) = part.strip_prefix("t=") {
            timestamp = t;
        } else if let Some(v) = part.strip_prefix("v1=") {
            signatures.push(v);
        }
    }

    if timestamp.is_empty() || signatures.is_empty() {
        return Err("Invalid Stripe-Signature header");
    }

    let ts: i64 = timestamp.parse().map_err(|_| "Invalid timestamp")?;
    if (now - ts).abs() > SIGNATURE_TOLERANCE_SECS {
        return Err("Webhook timestamp outside tolerance");
    }

    let payload = std::str::from_utf8(payload).map_err(|_| "Payload is not UTF-8")?;
    let signed_payload = format!("{}.{}", timestamp, payload);

    for signature in signatures {
        let Ok(sig_bytes) = hex::decode(signature) else {
            continue;
        };
        let mut mac =
            Hmac::<Sha256>::new_from_slice(secret.as_bytes()).map_err(|_| "HMAC key error")?;
        mac.update(signed_payload.as_bytes());
        if mac.verify_slice(&sig_bytes).is_ok() {
            return Ok(());
        }
    }

    Err("Webhook signature mismatch")
}
