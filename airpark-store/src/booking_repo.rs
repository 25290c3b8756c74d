use std::collections::HashMap;

use airpark_booking::models::{
    Booking, BookingFilter, BookingPaymentStatus, BookingStatus, Invoice, InvoiceStatus,
    PaymentRecord,
};
use airpark_booking::repository::{BookingRepository, InvoiceRepository, PaymentRepository};
use airpark_core::payment::PaymentStatus;
use airpark_core::RepoResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

pub struct StoreBookingRepository {
    pool: PgPool,
}

impl StoreBookingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_lines(&self, rows: Vec<BookingRow>) -> RepoResult<Vec<Booking>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let lines: Vec<(Uuid, Uuid)> = sqlx::query_as(
            r#"
            SELECT booking_id, vehicle_id
            FROM booking_lines
            WHERE booking_id = ANY($1)
            ORDER BY booking_id, position
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_booking: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for (booking_id, vehicle_id) in lines {
            by_booking.entry(booking_id).or_default().push(vehicle_id);
        }

        rows.into_iter()
            .map(|row| {
                let vehicles = by_booking.remove(&row.id).unwrap_or_default();
                row.into_booking(vehicles)
            })
            .collect()
    }

    async fn fetch_one(&self, row: Option<BookingRow>) -> RepoResult<Option<Booking>> {
        match row {
            Some(row) => Ok(self.attach_lines(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }
}

async fn insert_lines(tx: &mut Transaction<'_, Postgres>, booking: &Booking) -> RepoResult<()> {
    for (position, vehicle_id) in booking.vehicle_ids.iter().enumerate() {
        sqlx::query(
            "INSERT INTO booking_lines (booking_id, vehicle_id, position) VALUES ($1, $2, $3)",
        )
        .bind(booking.id)
        .bind(vehicle_id)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    reference: String,
    user_id: Uuid,
    flight_id: Uuid,
    parking_slot_id: Uuid,
    tariff_id: Uuid,
    drop_off_at: DateTime<Utc>,
    pick_up_at: DateTime<Utc>,
    days: i64,
    total_pence: i64,
    currency: String,
    status: String,
    payment_method: String,
    payment_status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self, vehicle_ids: Vec<Uuid>) -> RepoResult<Booking> {
        Ok(Booking {
            id: self.id,
            reference: self.reference,
            user_id: self.user_id,
            flight_id: self.flight_id,
            parking_slot_id: self.parking_slot_id,
            tariff_id: self.tariff_id,
            drop_off_at: self.drop_off_at,
            pick_up_at: self.pick_up_at,
            days: self.days,
            total_pence: self.total_pence,
            currency: self.currency,
            status: self.status.parse()?,
            payment_method: self.payment_method.parse()?,
            payment_status: self.payment_status.parse()?,
            vehicle_ids,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

const BOOKING_COLUMNS: &str = "id, reference, user_id, flight_id, parking_slot_id, tariff_id, \
    drop_off_at, pick_up_at, days, total_pence, currency, status, payment_method, payment_status, \
    created_at, updated_at";

#[async_trait]
impl BookingRepository for StoreBookingRepository {
    async fn create_booking(&self, booking: &Booking) -> RepoResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO bookings (id, reference, user_id, flight_id, parking_slot_id, tariff_id,
                                  drop_off_at, pick_up_at, days, total_pence, currency, status,
                                  payment_method, payment_status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            "#,
        )
        .bind(booking.id)
        .bind(&booking.reference)
        .bind(booking.user_id)
        .bind(booking.flight_id)
        .bind(booking.parking_slot_id)
        .bind(booking.tariff_id)
        .bind(booking.drop_off_at)
        .bind(booking.pick_up_at)
        .bind(booking.days)
        .bind(booking.total_pence)
        .bind(&booking.currency)
        .bind(booking.status.as_str())
        .bind(booking.payment_method.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        insert_lines(&mut tx, booking).await?;

        tx.commit().await?;
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE id = $1",
            BOOKING_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        self.fetch_one(row).await
    }

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE reference = $1",
            BOOKING_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        self.fetch_one(row).await
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "SELECT {} FROM bookings WHERE user_id = $1 ORDER BY created_at DESC",
            BOOKING_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        self.attach_lines(rows).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> RepoResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE ($1::TEXT IS NULL OR status = $1)
              AND ($2::UUID IS NULL OR user_id = $2)
              AND ($3::TIMESTAMPTZ IS NULL OR pick_up_at > $3)
              AND ($4::TIMESTAMPTZ IS NULL OR drop_off_at < $4)
            ORDER BY drop_off_at
            "#,
            BOOKING_COLUMNS
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.user_id)
        .bind(filter.from)
        .bind(filter.to)
        .fetch_all(&self.pool)
        .await?;
        self.attach_lines(rows).await
    }

    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE bookings
            SET flight_id = $2, parking_slot_id = $3, tariff_id = $4,
                drop_off_at = $5, pick_up_at = $6,
                days = $7, total_pence = $8, status = $9, payment_status = $10, updated_at = $11
            WHERE id = $1
            "#,
        )
        .bind(booking.id)
        .bind(booking.flight_id)
        .bind(booking.parking_slot_id)
        .bind(booking.tariff_id)
        .bind(booking.drop_off_at)
        .bind(booking.pick_up_at)
        .bind(booking.days)
        .bind(booking.total_pence)
        .bind(booking.status.as_str())
        .bind(booking.payment_status.as_str())
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query("DELETE FROM booking_lines WHERE booking_id = $1")
            .bind(booking.id)
            .execute(&mut *tx)
            .await?;
        insert_lines(&mut tx, booking).await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: BookingPaymentStatus,
    ) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE bookings SET payment_status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_booking(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM bookings WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {}
            FROM bookings
            WHERE status = 'PENDING_PAYMENT' AND created_at < $1
            ORDER BY created_at
            "#,
            BOOKING_COLUMNS
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;
        self.attach_lines(rows).await
    }

    async fn list_overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            r#"
            SELECT {} FROM bookings
            WHERE status IN ('PENDING_PAYMENT', 'CONFIRMED', 'CHECKED_IN')
              AND drop_off_at < $2 AND pick_up_at > $1
            ORDER BY drop_off_at
            "#,
            BOOKING_COLUMNS
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        self.attach_lines(rows).await
    }
}

pub struct StoreInvoiceRepository {
    pool: PgPool,
}

impl StoreInvoiceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct InvoiceRow {
    id: Uuid,
    invoice_number: String,
    booking_id: Uuid,
    user_id: Uuid,
    company_name: Option<String>,
    amount_pence: i64,
    currency: String,
    status: String,
    issued_at: DateTime<Utc>,
    due_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
}

impl TryFrom<InvoiceRow> for Invoice {
    type Error = airpark_core::RepoError;

    fn try_from(row: InvoiceRow) -> Result<Self, Self::Error> {
        Ok(Invoice {
            id: row.id,
            invoice_number: row.invoice_number,
            booking_id: row.booking_id,
            user_id: row.user_id,
            company_name: row.company_name,
            amount_pence: row.amount_pence,
            currency: row.currency,
            status: row.status.parse()?,
            issued_at: row.issued_at,
            due_at: row.due_at,
            paid_at: row.paid_at,
        })
    }
}

const INVOICE_COLUMNS: &str = "id, invoice_number, booking_id, user_id, company_name, \
    amount_pence, currency, status, issued_at, due_at, paid_at";

#[async_trait]
impl InvoiceRepository for StoreInvoiceRepository {
    async fn create_invoice(&self, invoice: &Invoice) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO invoices (id, invoice_number, booking_id, user_id, company_name,
                                  amount_pence, currency, status, issued_at, due_at, paid_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(invoice.id)
        .bind(&invoice.invoice_number)
        .bind(invoice.booking_id)
        .bind(invoice.user_id)
        .bind(&invoice.company_name)
        .bind(invoice.amount_pence)
        .bind(&invoice.currency)
        .bind(invoice.status.as_str())
        .bind(invoice.issued_at)
        .bind(invoice.due_at)
        .bind(invoice.paid_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE id = $1",
            INVOICE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invoice::try_from).transpose()
    }

    async fn get_invoice_for_booking(&self, booking_id: Uuid) -> RepoResult<Option<Invoice>> {
        let row = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE booking_id = $1 ORDER BY issued_at DESC LIMIT 1",
            INVOICE_COLUMNS
        ))
        .bind(booking_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Invoice::try_from).transpose()
    }

    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> RepoResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            r#"
            SELECT {}
            FROM invoices
            WHERE ($1::TEXT IS NULL OR status = $1)
            ORDER BY issued_at DESC
            "#,
            INVOICE_COLUMNS
        ))
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn list_invoices_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE user_id = $1 ORDER BY issued_at DESC",
            INVOICE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Invoice::try_from).collect()
    }

    async fn update_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE invoices SET status = $2, paid_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .bind(paid_at)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_issued_due_before(&self, now: DateTime<Utc>) -> RepoResult<Vec<Invoice>> {
        let rows = sqlx::query_as::<_, InvoiceRow>(&format!(
            "SELECT {} FROM invoices WHERE status = 'ISSUED' AND due_at < $1 ORDER BY due_at",
            INVOICE_COLUMNS
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Invoice::try_from).collect()
    }
}

pub struct StorePaymentRepository {
    pool: PgPool,
}

impl StorePaymentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    booking_id: Uuid,
    method: String,
    amount_pence: i64,
    currency: String,
    provider_reference: Option<String>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<PaymentRow> for PaymentRecord {
    type Error = airpark_core::RepoError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        Ok(PaymentRecord {
            id: row.id,
            booking_id: row.booking_id,
            method: row.method.parse()?,
            amount_pence: row.amount_pence,
            currency: row.currency,
            provider_reference: row.provider_reference,
            status: row.status.parse()?,
            created_at: row.created_at,
        })
    }
}

const PAYMENT_COLUMNS: &str =
    "id, booking_id, method, amount_pence, currency, provider_reference, status, created_at";

#[async_trait]
impl PaymentRepository for StorePaymentRepository {
    async fn create_payment(&self, record: &PaymentRecord) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO payments (id, booking_id, method, amount_pence, currency,
                                  provider_reference, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(record.id)
        .bind(record.booking_id)
        .bind(record.method.as_str())
        .bind(record.amount_pence)
        .bind(&record.currency)
        .bind(&record.provider_reference)
        .bind(record.status.as_str())
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_by_provider_reference(
        &self,
        reference: &str,
    ) -> RepoResult<Option<PaymentRecord>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            r#"
            SELECT {}
            FROM payments
            WHERE provider_reference = $1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PAYMENT_COLUMNS
        ))
        .bind(reference)
        .fetch_optional(&self.pool)
        .await?;
        row.map(PaymentRecord::try_from).transpose()
    }

    async fn list_payments_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<PaymentRecord>> {
        let rows = sqlx::query_as::<_, PaymentRow>(&format!(
            "SELECT {} FROM payments WHERE booking_id = $1 ORDER BY created_at",
            PAYMENT_COLUMNS
        ))
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(PaymentRecord::try_from).collect()
    }

    async fn update_record_status(&self, id: Uuid, status: PaymentStatus) -> RepoResult<bool> {
        let result = sqlx::query("UPDATE payments SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
