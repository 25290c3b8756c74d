use airpark_core::payment::{PaymentAdapter, PaymentIntent, PaymentMethod, PaymentStatus};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::BookingError;

/// Routes each payment method to its gateway
pub struct PaymentOrchestrator {
    card: Arc<dyn PaymentAdapter>,
    paypal: Arc<dyn PaymentAdapter>,
}

impl PaymentOrchestrator {
    pub fn new(card: Arc<dyn PaymentAdapter>, paypal: Arc<dyn PaymentAdapter>) -> Self {
        Self { card, paypal }
    }

    fn adapter(&self, method: PaymentMethod) -> Result<&Arc<dyn PaymentAdapter>, BookingError> {
        match method {
            PaymentMethod::Card => Ok(&self.card),
            PaymentMethod::PayPal => Ok(&self.paypal),
            PaymentMethod::Cash | PaymentMethod::Invoice => Err(BookingError::Validation(format!(
                "{} payments are not taken through a gateway",
                method.as_str()
            ))),
        }
    }

    /// Initialize a payment intent for a booking
    pub async fn initialize_payment(
        &self,
        method: PaymentMethod,
        booking_id: Uuid,
        amount_pence: i64,
        currency: &str,
    ) -> Result<PaymentIntent, BookingError> {
        let adapter = self.adapter(method)?;
        adapter
            .create_intent(booking_id, amount_pence, currency)
            .await
            .map_err(|e| gateway_error(adapter.name(), "create_intent", e))
    }

    /// Capture an authorized intent
    pub async fn capture(
        &self,
        method: PaymentMethod,
        intent_id: &str,
    ) -> Result<PaymentIntent, BookingError> {
        let adapter = self.adapter(method)?;
        adapter
            .capture_payment(intent_id)
            .await
            .map_err(|e| gateway_error(adapter.name(), "capture_payment", e))
    }

    /// Process a status update (e.g., from a webhook) by re-reading the intent from the provider
    pub async fn process_status_update(
        &self,
        method: PaymentMethod,
        intent_id: &str,
    ) -> Result<PaymentIntent, BookingError> {
        let adapter = self.adapter(method)?;
        adapter
            .get_intent(intent_id)
            .await
            .map_err(|e| gateway_error(adapter.name(), "get_intent", e))
    }

    pub async fn refund(
        &self,
        method: PaymentMethod,
        intent_id: &str,
        amount_pence: i64,
    ) -> Result<PaymentStatus, BookingError> {
        let adapter = self.adapter(method)?;
        adapter
            .refund_payment(intent_id, amount_pence)
            .await
            .map_err(|e| gateway_error(adapter.name(), "refund_payment", e))
    }
}

fn gateway_error(
    gateway: &str,
    op: &str,
    err: Box<dyn std::error::Error + Send + Sync>,
) -> BookingError {
    tracing::error!("Payment gateway {} failed during {}: {}", gateway, op, err);
    BookingError::Gateway(format!("{} {} failed", gateway, op))
}

/// In-process gateway for development and tests
pub struct MockPaymentAdapter {
    prefix: &'static str,
    intents: Mutex<HashMap<String, PaymentIntent>>,
    outage: AtomicBool,
    decline: AtomicBool,
}

impl MockPaymentAdapter {
    pub fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            intents: Mutex::new(HashMap::new()),
            outage: AtomicBool::new(false),
            decline: AtomicBool::new(false),
        }
    }

    /// Every call fails as if the provider were unreachable
    pub fn set_outage(&self, on: bool) {
        self.outage.store(on, Ordering::SeqCst);
    }

    /// Captures end in `Failed`
    pub fn set_decline(&self, on: bool) {
        self.decline.store(on, Ordering::SeqCst);
    }

    fn check_outage(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.outage.load(Ordering::SeqCst) {
            return Err("Simulated payment gateway outage".into());
        }
        Ok(())
    }

    async fn transition(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        let mut intents = self.intents.lock().await;
        let intent = intents
            .get_mut(intent_id)
            .ok_or_else(|| format!("No such intent: {}", intent_id))?;
        intent.status = status;
        Ok(intent.clone())
    }
}

#[async_trait::async_trait]
impl PaymentAdapter for MockPaymentAdapter {
    fn name(&self) -> &'static str {
        self.prefix
    }

    async fn create_intent(
        &self,
        booking_id: Uuid,
        amount_pence: i64,
        currency: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        self.check_outage()?;
        let id = format!("{}_{}", self.prefix, Uuid::new_v4().simple());
        let intent = PaymentIntent {
            id: id.clone(),
            booking_id,
            amount_pence,
            currency: currency.to_string(),
            status: PaymentStatus::RequiresPaymentMethod,
            client_secret: Some(format!("{}_secret", id)),
            approval_url: Some(format!("https://payments.invalid/approve/{}", id)),
            created_at: chrono::Utc::now(),
        };
        self.intents.lock().await.insert(id, intent.clone());
        Ok(intent)
    }

    async fn get_intent(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        self.check_outage()?;
        self.intents
            .lock()
            .await
            .get(intent_id)
            .cloned()
            .ok_or_else(|| format!("No such intent: {}", intent_id).into())
    }

    async fn capture_payment(
        &self,
        intent_id: &str,
    ) -> Result<PaymentIntent, Box<dyn std::error::Error + Send + Sync>> {
        self.check_outage()?;
        let status = if self.decline.load(Ordering::SeqCst) {
            PaymentStatus::Failed
        } else {
            PaymentStatus::Succeeded
        };
        self.transition(intent_id, status).await
    }

    async fn refund_payment(
        &self,
        intent_id: &str,
        _amount_pence: i64,
    ) -> Result<PaymentStatus, Box<dyn std::error::Error + Send + Sync>> {
        self.check_outage()?;
        Ok(self.transition(intent_id, PaymentStatus::Refunded).await?.status)
    }
}
