use airpark_core::payment::{PaymentAdapter, PaymentIntent, PaymentStatus};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::{json, Value};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{format_minor_units, parse_minor_units};

#[derive(Debug, Clone)]
pub struct PayPalConfig {
    pub client_id: String,
    pub client_secret: String,
    /// `https://api-m.sandbox.paypal.com` or `https://api-m.paypal.com`
    pub base_url: String,
    pub return_url: String,
    pub cancel_url: String,
}

struct AccessToken {
    value: String,
    expires_at: DateTime<Utc>,
}

/// PayPal Orders v2 with explicit capture
pub struct PayPalAdapter {
    client: reqwest::Client,
    config: PayPalConfig,
    token: Mutex<Option<AccessToken>>,
}

impl PayPalAdapter {
    pub fn new(config: PayPalConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
            token: Mutex::new(None),
        }
    }

    async fn access_token(&self) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        let response = self
            .client
            .post(format!("{}/v1/oauth2/token", self.config.base_url))
            .basic_auth(&self.config.client_id, Some(&self.config.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await?;
        if !status.is_success() {
            return Err(format!("PayPal token request returned {}", status).into());
        }

        let value = body["access_token"]
            .as_str()
            .ok_or("PayPal token response without access_token")?
            .to_string();
        // Refresh a minute early
        let ttl = body["expires_in"].as_i64().unwrap_or(300) - 60;
        *cached = Some(AccessToken {
            value: value.clone(),
            expires_at: Utc::now() + Duration::seconds(ttl.max(0)),
        });
        Ok(value)
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        let token = self.access_token().await?;
        let response = request.bearer_auth(token).send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body["message"].as_str().unwrap_or("unknown error");
            return Err(format!("PayPal returned {}: {}", status, message).into());
        }
        Ok(body)
    }

    async fn get_order(
        &self,
        order_id: &str,
    ) -> Result<Value, Box<dyn std::error::Error + Send + Sync>> {
        self.send(
            self.client
                .get(format!("{}/v2/checkout/orders/{}", self.config.base_url, order_id)),
        )
        .await
    }
}

pub fn map_paypal_status(status: &str) -> PaymentStatus {
    match status {
        "CREATED" | "SAVED" => PaymentStatus::RequiresPaymentMethod,
        "PAYER_ACTION_REQUIRED" => PaymentStatus::RequiresAction,
        "APPROVED" => PaymentStatus::Processing,
        "COMPLETED" => PaymentStatus::Succeeded,
        "VOIDED" => PaymentStatus::Canceled,
        _ => PaymentStatus::Failed,
    }
}

fn intent_from_order(
    body: &Value,
) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
    let id = body["id"].as_str().ok_or("PayPal order without id")?.to_string();
    let unit = &body["purchase_units"][0];
    let booking_id = unit["reference_id"]
        .as_str()
        .map(Uuid::parse_str)
        .transpose()?
        .ok_or("PayPal order without reference_id")?;

    let approval_url = body["links"].as_array().and_then(|links| {
        links
            .iter()
            .find(|l| matches!(l["rel"].as_str(), Some("approve") | Some("payer-action")))
            .and_then(|l| l["href"].as_str())
            .map(String::from)
    });

    Ok(PaymentIntent {
        id,
        booking_id,
        amount_pence: unit["amount"]["value"].as_str().and_then(parse_minor_units).unwrap_or(0),
        currency: unit["amount"]["currency_code"].as_str().unwrap_or("GBP").to_string(),
        status: map_paypal_status(body["status"].as_str().unwrap_or("")),
        client_secret: None,
        approval_url,
        created_at: body["create_time"]
            .as_str()
            .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(Utc::now),
    })
}

#[async_trait]
impl PaymentAdapter for PayPalAdapter {
    fn name(&self) -> &'static str {
        "paypal"
    }

    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount_pence: i64,
        currency: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let payload = json!({
            "intent": "CAPTURE",
            "purchase_units": [{
                "reference_id": booking_id.to_string(),
                "amount": {
                    "currency_code": currency.to_uppercase(),
                    "value": format_minor_units(amount_pence),
                }
            }],
            "application_context": {
                "return_url": self.config.return_url,
                "cancel_url": self.config.cancel_url,
            }
        });

        let body = self
            .send(
                self.client
                    .post(format!("{}/v2/checkout/orders", self.config.base_url))
                    .json(&payload),
            )
            .await?;

        // The create response omits the amount; fill it from the request
        let mut intent = intent_from_order(&body).or_else(|_| {
            let mut patched = body.clone();
            patched["purchase_units"] = payload["purchase_units"].clone();
            intent_from_order(&patched)
        })?;
        intent.amount_pence = amount_pence;
        Ok(intent)
    }

    async fn get_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let body = self.get_order(intent_id).await?;
        intent_from_order(&body)
    }

    async fn capture_payment(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let current = self.get_intent(intent_id).await?;
        if current.status != PaymentStatus::Processing {
            return Ok(current);
        }

        self.send(
            self.client
                .post(format!("{}/v2/checkout/orders/{}/capture", self.config.base_url, intent_id))
                .json(&json!({})),
        )
        .await?;

        self.get_intent(intent_id).await
    }

    async fn refund_payment(
        &self,
        intent_id: &str,
        amount_pence: i64,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>> {
        let order = self.get_order(intent_id).await?;
        let capture_id = order["purchase_units"][0]["payments"]["captures"][0]["id"]
            .as_str()
            .ok_or("PayPal order has no capture to refund")?
            .to_string();
        let currency = order["purchase_units"][0]["amount"]["currency_code"]
            .as_str()
            .unwrap_or("GBP")
            .to_string();

        let body = self
            .send(
                self.client
                    .post(format!(
                        "{}/v2/payments/captures/{}/refund",
                        self.config.base_url, capture_id
                    ))
                    .json(&json!({
                        "amount": {
                            "value": format_minor_units(amount_pence),
                            "currency_code": currency,
                        }
                    })),
            )
            .await?;

        match body["status"].as_str() {
            Some("COMPLETED") | Some("PENDING") => Ok(PaymentStatus::Refunded),
            other => Err(format!("PayPal refund for {} ended as {:?}", intent_id, other).into()),
        }
    }
}
