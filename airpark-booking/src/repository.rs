use airpark_core::payment::PaymentStatus;
use airpark_core::RepoResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Booking, BookingFilter, BookingPaymentStatus, BookingStatus, Invoice, InvoiceStatus,
    PaymentRecord,
};

/// Repository trait for bookings and their vehicle lines
#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert the booking together with one line per vehicle
    async fn create_booking(&self, booking: &Booking) -> RepoResult<()>;

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>>;

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Booking>>;

    /// Newest first
    async fn list_bookings_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>>;

    /// Ordered by drop-off time
    async fn list_bookings(&self, filter: &BookingFilter) -> RepoResult<Vec<Booking>>;

    /// Replace the mutable fields and the vehicle lines
    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool>;

    async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> RepoResult<bool>;

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: BookingPaymentStatus,
    ) -> RepoResult<bool>;

    async fn delete_booking(&self, id: Uuid) -> RepoResult<bool>;

    /// PendingPayment bookings created before `cutoff`
    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Booking>>;

    /// Slot-holding bookings whose stay overlaps [from, to)
    async fn list_overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Booking>>;
}

#[async_trait]
pub trait InvoiceRepository: Send + Sync {
    async fn create_invoice(&self, invoice: &Invoice) -> RepoResult<()>;

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Option<Invoice>>;

    async fn get_invoice_for_booking(&self, booking_id: Uuid) -> RepoResult<Option<Invoice>>;

    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> RepoResult<Vec<Invoice>>;

    async fn list_invoices_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Invoice>>;

    async fn update_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepoResult<bool>;

    /// Issued invoices whose due date has passed
    async fn list_issued_due_before(&self, now: DateTime<Utc>) -> RepoResult<Vec<Invoice>>;
}

/// Ledger of payment attempts
#[async_trait]
pub trait PaymentRepository: Send + Sync {
    async fn create_payment(&self, record: &PaymentRecord) -> RepoResult<()>;

    async fn find_by_provider_reference(
        &self,
        reference: &str,
    ) -> RepoResult<Option<PaymentRecord>>;

    /// Oldest first
    async fn list_payments_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<PaymentRecord>>;

    async fn update_record_status(&self, id: Uuid, status: PaymentStatus) -> RepoResult<bool>;
}
