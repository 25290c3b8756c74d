use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How a booking is settled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    #[serde(rename = "PAYPAL")]
    PayPal,
    Cash,
    Invoice,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "CARD",
            PaymentMethod::PayPal => "PAYPAL",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Invoice => "INVOICE",
        }
    }

    /// Card and PayPal are charged through an external gateway
    pub fn uses_gateway(&self) -> bool {
        matches!(self, PaymentMethod::Card | PaymentMethod::PayPal)
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CARD" => Ok(PaymentMethod::Card),
            "PAYPAL" => Ok(PaymentMethod::PayPal),
            "CASH" => Ok(PaymentMethod::Cash),
            "INVOICE" => Ok(PaymentMethod::Invoice),
            other => Err(crate::CoreError::ValidationError(format!(
                "unknown payment method {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    RequiresPaymentMethod,
    RequiresAction,
    Processing,
    Succeeded,
    Canceled,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::RequiresPaymentMethod => "REQUIRES_PAYMENT_METHOD",
            PaymentStatus::RequiresAction => "REQUIRES_ACTION",
            PaymentStatus::Processing => "PROCESSING",
            PaymentStatus::Succeeded => "SUCCEEDED",
            PaymentStatus::Canceled => "CANCELED",
            PaymentStatus::Failed => "FAILED",
            PaymentStatus::Refunded => "REFUNDED",
        }
    }

    /// No further gateway movement expected
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Succeeded
                | PaymentStatus::Canceled
                | PaymentStatus::Failed
                | PaymentStatus::Refunded
        )
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = crate::CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "REQUIRES_PAYMENT_METHOD" => Ok(PaymentStatus::RequiresPaymentMethod),
            "REQUIRES_ACTION" => Ok(PaymentStatus::RequiresAction),
            "PROCESSING" => Ok(PaymentStatus::Processing),
            "SUCCEEDED" => Ok(PaymentStatus::Succeeded),
            "CANCELED" => Ok(PaymentStatus::Canceled),
            "FAILED" => Ok(PaymentStatus::Failed),
            "REFUNDED" => Ok(PaymentStatus::Refunded),
            other => Err(crate::CoreError::ValidationError(format!(
                "unknown payment status {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub id: String, // Provider's ID (e.g., pi_123 or a PayPal order id)
    pub booking_id: Uuid,
    pub amount_pence: i64,
    pub currency: String,
    pub status: PaymentStatus,
    pub client_secret: Option<String>,
    /// Where the customer approves a PayPal order
    pub approval_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentAdapter: Send + Sync {
    /// Gateway name used in logs and metrics
    fn name(&self) -> &'static str;

    /// Create a payment intent with the provider
    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount_pence: i64,
        currency: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>>;

    /// Retrieve intent status
    async fn get_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>>;

    /// Capture a previously authorized or approved payment
    async fn capture_payment(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>>;

    /// Refund a captured payment in full or in part
    async fn refund_payment(
        &self,
        intent_id: &str,
        amount_pence: i64,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>>;
}
