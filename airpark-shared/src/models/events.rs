use uuid::Uuid;

pub const TOPIC_BOOKING_CONFIRMED: &str = "booking.confirmed";
pub const TOPIC_BOOKING_CANCELLED: &str = "booking.cancelled";
pub const TOPIC_PAYMENT_CAPTURED: &str = "payment.captured";
pub const TOPIC_INVOICE_ISSUED: &str = "invoice.issued";
pub const TOPIC_SLOT_STATUS: &str = "slot.status";

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingConfirmedEvent {
    pub booking_id: Uuid,
    pub reference: String,
    pub user_id: Uuid,
    pub parking_slot_id: Uuid,
    pub total_pence: i64,
    pub payment_method: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct BookingCancelledEvent {
    pub booking_id: Uuid,
    pub reference: String,
    pub reason: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct PaymentCapturedEvent {
    pub booking_id: Uuid,
    pub method: String,
    pub provider_reference: Option<String>,
    pub amount_pence: i64,
    pub currency: String,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct InvoiceIssuedEvent {
    pub invoice_id: Uuid,
    pub invoice_number: String,
    pub booking_id: Uuid,
    pub amount_pence: i64,
    pub due_at: i64,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct SlotStatusChangedEvent {
    pub parking_slot_id: Uuid,
    pub number: i32,
    pub status: String,
    pub timestamp: i64,
}
