use airpark_core::payment::{PaymentMethod, PaymentStatus};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::BookingError;

/// Booking status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingStatus {
    PendingPayment,
    Confirmed,
    CheckedIn,
    Completed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::PendingPayment => "PENDING_PAYMENT",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::CheckedIn => "CHECKED_IN",
            BookingStatus::Completed => "COMPLETED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Expired => "EXPIRED",
        }
    }

    /// The booking still holds its parking slot
    pub fn holds_slot(&self) -> bool {
        matches!(
            self,
            BookingStatus::PendingPayment | BookingStatus::Confirmed | BookingStatus::CheckedIn
        )
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING_PAYMENT" => Ok(BookingStatus::PendingPayment),
            "CONFIRMED" => Ok(BookingStatus::Confirmed),
            "CHECKED_IN" => Ok(BookingStatus::CheckedIn),
            "COMPLETED" => Ok(BookingStatus::Completed),
            "CANCELLED" => Ok(BookingStatus::Cancelled),
            "EXPIRED" => Ok(BookingStatus::Expired),
            other => Err(BookingError::Validation(format!("unknown booking status {}", other))),
        }
    }
}

/// Settlement state of a booking's money
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookingPaymentStatus {
    Unpaid,
    Pending,
    Paid,
    Invoiced,
    Refunded,
}

impl BookingPaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingPaymentStatus::Unpaid => "UNPAID",
            BookingPaymentStatus::Pending => "PENDING",
            BookingPaymentStatus::Paid => "PAID",
            BookingPaymentStatus::Invoiced => "INVOICED",
            BookingPaymentStatus::Refunded => "REFUNDED",
        }
    }
}

impl std::str::FromStr for BookingPaymentStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNPAID" => Ok(BookingPaymentStatus::Unpaid),
            "PENDING" => Ok(BookingPaymentStatus::Pending),
            "PAID" => Ok(BookingPaymentStatus::Paid),
            "INVOICED" => Ok(BookingPaymentStatus::Invoiced),
            "REFUNDED" => Ok(BookingPaymentStatus::Refunded),
            other => Err(BookingError::Validation(format!("unknown payment status {}", other))),
        }
    }
}

/// A customer's reservation: user, flight, slot, tariff and vehicles
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub reference: String,
    pub user_id: Uuid,
    pub flight_id: Uuid,
    pub parking_slot_id: Uuid,
    pub tariff_id: Uuid,
    pub drop_off_at: DateTime<Utc>,
    pub pick_up_at: DateTime<Utc>,
    pub days: i64,
    pub total_pence: i64,
    pub currency: String,
    pub status: BookingStatus,
    pub payment_method: PaymentMethod,
    pub payment_status: BookingPaymentStatus,
    pub vehicle_ids: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Booking {
    /// Join records for the booked vehicles
    pub fn lines(&self) -> Vec<BookingLine> {
        self.vehicle_ids
            .iter()
            .map(|vehicle_id| BookingLine {
                booking_id: self.id,
                vehicle_id: *vehicle_id,
            })
            .collect()
    }

    /// Does the stay overlap the half-open window [from, to)?
    pub fn overlaps(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> bool {
        self.drop_off_at < to && self.pick_up_at > from
    }
}

/// Join record associating a booking with a vehicle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct BookingLine {
    pub booking_id: Uuid,
    pub vehicle_id: Uuid,
}

/// Staff-side listing filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookingFilter {
    pub status: Option<BookingStatus>,
    pub user_id: Option<Uuid>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl BookingFilter {
    pub fn matches(&self, booking: &Booking) -> bool {
        if let Some(status) = self.status {
            if booking.status != status {
                return false;
            }
        }
        if let Some(user_id) = self.user_id {
            if booking.user_id != user_id {
                return false;
            }
        }
        if let Some(from) = self.from {
            if booking.pick_up_at <= from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if booking.drop_off_at >= to {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvoiceStatus {
    Issued,
    Paid,
    Overdue,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Issued => "ISSUED",
            InvoiceStatus::Paid => "PAID",
            InvoiceStatus::Overdue => "OVERDUE",
            InvoiceStatus::Void => "VOID",
        }
    }
}

impl std::str::FromStr for InvoiceStatus {
    type Err = BookingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ISSUED" => Ok(InvoiceStatus::Issued),
            "PAID" => Ok(InvoiceStatus::Paid),
            "OVERDUE" => Ok(InvoiceStatus::Overdue),
            "VOID" => Ok(InvoiceStatus::Void),
            other => Err(BookingError::Validation(format!("unknown invoice status {}", other))),
        }
    }
}

/// Billing record for a corporate-customer booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub id: Uuid,
    pub invoice_number: String,
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub company_name: Option<String>,
    pub amount_pence: i64,
    pub currency: String,
    pub status: InvoiceStatus,
    pub issued_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
}

/// Ledger of money movements against a booking
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub method: PaymentMethod,
    pub amount_pence: i64,
    pub currency: String,
    pub provider_reference: Option<String>,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(
        booking_id: Uuid,
        method: PaymentMethod,
        amount_pence: i64,
        currency: &str,
        provider_reference: Option<String>,
        status: PaymentStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            booking_id,
            method,
            amount_pence,
            currency: currency.to_string(),
            provider_reference,
            status,
            created_at: Utc::now(),
        }
    }
}

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Customer-facing booking reference, e.g. `AP-7KQ2MX`
pub fn generate_reference() -> String {
    let mut rng = rand::thread_rng();
    let code: String = (0..6)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("AP-{}", code)
}
