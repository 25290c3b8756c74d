use std::collections::HashSet;
use std::sync::Arc;

use airpark_catalog::{ParkingSlot, PricingConfig, PricingEngine, Quote, SlotStatus};
use airpark_core::events::{publish_json, EventPublisher};
use airpark_core::identity::{Role, User};
use airpark_core::payment::{PaymentIntent, PaymentMethod, PaymentStatus};
use airpark_core::repository::{
    FlightRepository, ParkingSlotRepository, TariffRepository, UserRepository, VehicleRepository,
};
use airpark_shared::models::events::{
    BookingCancelledEvent, BookingConfirmedEvent, InvoiceIssuedEvent, PaymentCapturedEvent,
    TOPIC_BOOKING_CANCELLED, TOPIC_BOOKING_CONFIRMED, TOPIC_INVOICE_ISSUED, TOPIC_PAYMENT_CAPTURED,
    TOPIC_SLOT_STATUS,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::invoicing::InvoiceGenerator;
use crate::models::{
    generate_reference, Booking, BookingFilter, BookingPaymentStatus, BookingStatus, Invoice,
    InvoiceStatus, PaymentRecord,
};
use crate::orchestrator::PaymentOrchestrator;
use crate::repository::{BookingRepository, InvoiceRepository, PaymentRepository};
use crate::{BookingError, BookingResult};

/// Every store the booking use-cases touch
#[derive(Clone)]
pub struct Repositories {
    pub users: Arc<dyn UserRepository>,
    pub vehicles: Arc<dyn VehicleRepository>,
    pub flights: Arc<dyn FlightRepository>,
    pub tariffs: Arc<dyn TariffRepository>,
    pub slots: Arc<dyn ParkingSlotRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub invoices: Arc<dyn InvoiceRepository>,
    pub payments: Arc<dyn PaymentRepository>,
}

/// Business rules the service is configured with
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingPolicy {
    pub booking_fee_pence: i64,
    pub invoice_due_days: i64,
    pub pending_payment_ttl_minutes: i64,
    pub currency: String,
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            booking_fee_pence: 0,
            invoice_due_days: 30,
            pending_payment_ttl_minutes: 30,
            currency: "GBP".to_string(),
        }
    }
}

/// Who is calling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: Uuid,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: Uuid, role: Role) -> Self {
        Self { user_id, role }
    }

    fn can_access(&self, booking: &Booking) -> bool {
        self.role.is_staff() || booking.user_id == self.user_id
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuoteRequest {
    pub flight_id: Uuid,
    pub tariff_id: Uuid,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateBooking {
    pub flight_id: Uuid,
    pub tariff_id: Uuid,
    pub vehicle_ids: Vec<Uuid>,
    pub payment_method: PaymentMethod,
}

/// Staff edit; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBooking {
    pub flight_id: Option<Uuid>,
    pub tariff_id: Option<Uuid>,
    pub vehicle_ids: Option<Vec<Uuid>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingCreated {
    pub booking: Booking,
    pub quote: Quote,
    pub payment: Option<PaymentIntent>,
    pub invoice: Option<Invoice>,
}

pub struct BookingService {
    repos: Repositories,
    payments: Arc<PaymentOrchestrator>,
    events: Arc<dyn EventPublisher>,
    policy: BookingPolicy,
    pricing: PricingEngine,
    invoicing: InvoiceGenerator,
}

impl BookingService {
    pub fn new(
        repos: Repositories,
        payments: Arc<PaymentOrchestrator>,
        events: Arc<dyn EventPublisher>,
        policy: BookingPolicy,
    ) -> Self {
        let pricing = PricingEngine::new(PricingConfig {
            booking_fee_pence: policy.booking_fee_pence,
            ..PricingConfig::default()
        });
        let invoicing = InvoiceGenerator::new(policy.invoice_due_days);
        Self {
            repos,
            payments,
            events,
            policy,
            pricing,
            invoicing,
        }
    }

    pub fn policy(&self) -> &BookingPolicy {
        &self.policy
    }

    // ------------------------------------------------------------------
    // Customer use-cases
    // ------------------------------------------------------------------

    /// Price a stay without reserving anything
    pub async fn quote(&self, actor: &Actor, req: &QuoteRequest) -> BookingResult<Quote> {
        let flight = self.owned_flight(actor.user_id, req.flight_id).await?;
        let tariff = self
            .repos
            .tariffs
            .get_tariff(req.tariff_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Tariff {}", req.tariff_id)))?;

        Ok(self.pricing.quote(&tariff, flight.departure_at, flight.return_at)?)
    }

    pub async fn create_booking(
        &self,
        actor: &Actor,
        req: CreateBooking,
    ) -> BookingResult<BookingCreated> {
        // 1. Ownership checks
        let user = self.load_user(actor.user_id).await?;
        let flight = self.owned_flight(user.id, req.flight_id).await?;
        self.check_vehicles(user.id, &req.vehicle_ids).await?;

        // 2. Corporate customers are always invoiced
        let method = if user.is_corporate() {
            PaymentMethod::Invoice
        } else if req.payment_method == PaymentMethod::Invoice {
            return Err(BookingError::Validation(
                "invoice payment is only available to corporate customers".into(),
            ));
        } else {
            req.payment_method
        };

        // 3. Price
        let tariff = self
            .repos
            .tariffs
            .get_tariff(req.tariff_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Tariff {}", req.tariff_id)))?;
        let quote = self.pricing.quote(&tariff, flight.departure_at, flight.return_at)?;

        // 4. Allocate a slot
        let slot = self
            .repos
            .slots
            .reserve_first_available()
            .await?
            .ok_or(BookingError::NoSlotAvailable)?;
        self.publish_slot(&slot).await;

        let (status, payment_status) = match method {
            PaymentMethod::Invoice => (BookingStatus::Confirmed, BookingPaymentStatus::Invoiced),
            PaymentMethod::Cash => (BookingStatus::Confirmed, BookingPaymentStatus::Unpaid),
            PaymentMethod::Card | PaymentMethod::PayPal => {
                (BookingStatus::PendingPayment, BookingPaymentStatus::Pending)
            }
        };

        let now = Utc::now();
        let booking = Booking {
            id: Uuid::new_v4(),
            reference: generate_reference(),
            user_id: user.id,
            flight_id: flight.id,
            parking_slot_id: slot.id,
            tariff_id: tariff.id,
            drop_off_at: flight.departure_at,
            pick_up_at: flight.return_at,
            days: quote.days,
            total_pence: quote.total_pence,
            currency: self.policy.currency.clone(),
            status,
            payment_method: method,
            payment_status,
            vehicle_ids: req.vehicle_ids,
            created_at: now,
            updated_at: now,
        };

        // 5. Persist, giving the slot back if that fails
        if let Err(e) = self.repos.bookings.create_booking(&booking).await {
            tracing::error!("Failed to persist booking {}: {}", booking.reference, e);
            self.release_slot(slot.id).await;
            return Err(e.into());
        }

        // 6. Settlement per payment method
        let mut payment = None;
        let mut invoice = None;
        match method {
            PaymentMethod::Invoice => {
                let issued = match self.issue_invoice(&booking, &user, now).await {
                    Ok(issued) => issued,
                    Err(e) => {
                        tracing::error!("Failed to invoice booking {}: {}", booking.reference, e);
                        self.repos.bookings.delete_booking(booking.id).await?;
                        self.release_slot(slot.id).await;
                        return Err(e);
                    }
                };
                publish_json(
                    self.events.as_ref(),
                    TOPIC_INVOICE_ISSUED,
                    &issued.id.to_string(),
                    &InvoiceIssuedEvent {
                        invoice_id: issued.id,
                        invoice_number: issued.invoice_number.clone(),
                        booking_id: booking.id,
                        amount_pence: issued.amount_pence,
                        due_at: issued.due_at.timestamp(),
                        timestamp: now.timestamp(),
                    },
                )
                .await;
                invoice = Some(issued);
            }
            PaymentMethod::Card | PaymentMethod::PayPal => {
                let intent = match self
                    .payments
                    .initialize_payment(method, booking.id, booking.total_pence, &booking.currency)
                    .await
                {
                    Ok(intent) => intent,
                    Err(e) => {
                        // Nothing was charged; undo the booking
                        self.repos.bookings.delete_booking(booking.id).await?;
                        self.release_slot(slot.id).await;
                        return Err(e);
                    }
                };
                let record = PaymentRecord::new(
                    booking.id,
                    method,
                    booking.total_pence,
                    &booking.currency,
                    Some(intent.id.clone()),
                    intent.status,
                );
                self.repos.payments.create_payment(&record).await?;
                payment = Some(intent);
            }
            PaymentMethod::Cash => {}
        }

        // 7. Notify
        if booking.status == BookingStatus::Confirmed {
            self.publish_confirmed(&booking).await;
        }

        tracing::info!(
            "Booking {} created for user {} in slot {} ({} pence, {})",
            booking.reference,
            user.id,
            slot.number,
            booking.total_pence,
            method.as_str()
        );

        Ok(BookingCreated {
            booking,
            quote,
            payment,
            invoice,
        })
    }

    /// Owner or staff view of one booking
    pub async fn get_booking(&self, actor: &Actor, booking_id: Uuid) -> BookingResult<Booking> {
        let booking = self.load_booking(booking_id).await?;
        if !actor.can_access(&booking) {
            // Don't reveal other customers' bookings
            return Err(BookingError::NotFound(format!("Booking {}", booking_id)));
        }
        Ok(booking)
    }

    pub async fn list_my_bookings(&self, actor: &Actor) -> BookingResult<Vec<Booking>> {
        Ok(self.repos.bookings.list_bookings_for_user(actor.user_id).await?)
    }

    pub async fn list_my_invoices(&self, actor: &Actor) -> BookingResult<Vec<Invoice>> {
        Ok(self.repos.invoices.list_invoices_for_user(actor.user_id).await?)
    }

    /// Capture the outstanding gateway payment for a booking
    pub async fn pay_booking(&self, actor: &Actor, booking_id: Uuid) -> BookingResult<Booking> {
        let booking = self.get_booking(actor, booking_id).await?;
        if booking.payment_status != BookingPaymentStatus::Pending {
            return Err(BookingError::Conflict(format!(
                "booking {} has no payment awaiting capture (payment {})",
                booking.reference,
                booking.payment_status.as_str()
            )));
        }

        let record = self
            .open_payment(booking.id)
            .await?
            .ok_or_else(|| {
                BookingError::Conflict(format!("no open payment for booking {}", booking.reference))
            })?;
        let intent_id = record
            .provider_reference
            .clone()
            .ok_or_else(|| BookingError::Conflict("payment has no gateway reference".into()))?;

        let intent = self.payments.capture(record.method, &intent_id).await?;
        match intent.status {
            PaymentStatus::Succeeded => self.settle_captured(booking, &record, &intent).await,
            PaymentStatus::Failed | PaymentStatus::Canceled => {
                self.repos.payments.update_record_status(record.id, intent.status).await?;
                tracing::warn!("Payment {} for booking {} declined", intent_id, booking.reference);
                Err(BookingError::PaymentDeclined(format!(
                    "{} payment {}",
                    record.method.as_str(),
                    intent.status.as_str()
                )))
            }
            other => {
                // Still with the customer or the provider; a webhook will follow
                self.repos.payments.update_record_status(record.id, other).await?;
                Ok(booking)
            }
        }
    }

    /// Reconcile a booking with the gateway after a webhook hint.
    ///
    /// Returns `None` when the intent is not one of ours.
    pub async fn apply_gateway_update(
        &self,
        method: PaymentMethod,
        intent_id: &str,
    ) -> BookingResult<Option<Booking>> {
        let Some(record) = self.repos.payments.find_by_provider_reference(intent_id).await? else {
            tracing::warn!("Gateway update for unknown intent {}", intent_id);
            return Ok(None);
        };
        let booking = self.load_booking(record.booking_id).await?;

        if record.status.is_terminal() {
            return Ok(Some(booking));
        }

        if record.method != method {
            tracing::warn!(
                "{} update for intent {} recorded as {}",
                method.as_str(),
                intent_id,
                record.method.as_str()
            );
        }
        let mut intent = self
            .payments
            .process_status_update(record.method, intent_id)
            .await?;
        if intent.status == PaymentStatus::Processing {
            // Authorized, waiting for our capture
            intent = self.payments.capture(record.method, intent_id).await?;
        }

        match intent.status {
            PaymentStatus::Succeeded => {
                let booking = self.settle_captured(booking, &record, &intent).await?;
                Ok(Some(booking))
            }
            PaymentStatus::Failed | PaymentStatus::Canceled => {
                self.repos.payments.update_record_status(record.id, intent.status).await?;
                let mut booking = booking;
                if booking.status == BookingStatus::PendingPayment {
                    booking.cancel()?;
                    booking.payment_status = BookingPaymentStatus::Unpaid;
                    self.store_transition(&booking).await?;
                    self.release_slot(booking.parking_slot_id).await;
                    self.publish_cancelled(&booking, "payment failed").await;
                }
                Ok(Some(booking))
            }
            other => {
                self.repos.payments.update_record_status(record.id, other).await?;
                Ok(Some(booking))
            }
        }
    }

    /// Cancel by the owner or staff. Releases the slot and unwinds payment.
    pub async fn cancel_booking(&self, actor: &Actor, booking_id: Uuid) -> BookingResult<Booking> {
        let mut booking = self.get_booking(actor, booking_id).await?;
        booking.cancel()?;

        booking.payment_status = self.unwind_payment(&booking).await?;
        self.store_transition(&booking).await?;
        self.release_slot(booking.parking_slot_id).await;

        let reason = if actor.user_id == booking.user_id {
            "cancelled by customer"
        } else {
            "cancelled by staff"
        };
        self.publish_cancelled(&booking, reason).await;
        tracing::info!("Booking {} {}", booking.reference, reason);
        Ok(booking)
    }

    // ------------------------------------------------------------------
    // Staff use-cases
    // ------------------------------------------------------------------

    pub async fn list_bookings(&self, filter: &BookingFilter) -> BookingResult<Vec<Booking>> {
        Ok(self.repos.bookings.list_bookings(filter).await?)
    }

    /// Change flight, tariff or vehicles and re-price
    pub async fn update_booking(
        &self,
        booking_id: Uuid,
        req: UpdateBooking,
    ) -> BookingResult<Booking> {
        let mut booking = self.load_booking(booking_id).await?;
        if !booking.is_editable() {
            return Err(BookingError::Conflict(format!(
                "booking {} is {} and can no longer be changed",
                booking.reference,
                booking.status.as_str()
            )));
        }

        if let Some(flight_id) = req.flight_id {
            let flight = self.owned_flight(booking.user_id, flight_id).await?;
            booking.flight_id = flight.id;
            booking.drop_off_at = flight.departure_at;
            booking.pick_up_at = flight.return_at;
        }
        if let Some(tariff_id) = req.tariff_id {
            booking.tariff_id = tariff_id;
        }
        if let Some(vehicle_ids) = req.vehicle_ids {
            self.check_vehicles(booking.user_id, &vehicle_ids).await?;
            booking.vehicle_ids = vehicle_ids;
        }

        let tariff = self
            .repos
            .tariffs
            .get_tariff(booking.tariff_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Tariff {}", booking.tariff_id)))?;
        let quote = self.pricing.quote(&tariff, booking.drop_off_at, booking.pick_up_at)?;

        if quote.total_pence != booking.total_pence
            && booking.payment_status != BookingPaymentStatus::Unpaid
        {
            return Err(BookingError::Conflict(format!(
                "booking {} is already {}; cancel and rebook to change the price",
                booking.reference,
                booking.payment_status.as_str()
            )));
        }

        booking.days = quote.days;
        booking.total_pence = quote.total_pence;
        booking.updated_at = Utc::now();

        if !self.repos.bookings.update_booking(&booking).await? {
            return Err(BookingError::NotFound(format!("Booking {}", booking_id)));
        }
        tracing::info!("Booking {} updated ({} pence)", booking.reference, booking.total_pence);
        Ok(booking)
    }

    /// Hard delete. The slot is released if the booking still held it.
    pub async fn delete_booking(&self, booking_id: Uuid) -> BookingResult<()> {
        let booking = self.load_booking(booking_id).await?;
        if booking.status.holds_slot() {
            self.unwind_payment(&booking).await?;
            self.release_slot(booking.parking_slot_id).await;
        }
        self.repos.bookings.delete_booking(booking_id).await?;
        tracing::info!("Booking {} deleted", booking.reference);
        Ok(())
    }

    /// Vehicle dropped off at the car park
    pub async fn check_in(&self, booking_id: Uuid) -> BookingResult<Booking> {
        let mut booking = self.load_booking(booking_id).await?;
        booking.check_in()?;

        let mut slot = self.load_slot(booking.parking_slot_id).await?;
        slot.occupy()?;
        let slot = self
            .repos
            .slots
            .set_status(slot.id, SlotStatus::Occupied)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Parking slot {}", slot.id)))?;

        if let Err(e) = self
            .repos
            .bookings
            .update_booking_status(booking.id, booking.status)
            .await
        {
            // Hand the slot back so the check-in can be retried
            if let Err(undo) = self.repos.slots.set_status(slot.id, SlotStatus::Reserved).await {
                tracing::error!("Failed to restore slot {} to RESERVED: {}", slot.number, undo);
            }
            return Err(e.into());
        }
        self.publish_slot(&slot).await;
        tracing::info!("Booking {} checked in to slot {}", booking.reference, slot.number);
        Ok(booking)
    }

    /// Vehicle collected. Cash must have been taken first.
    pub async fn check_out(&self, booking_id: Uuid) -> BookingResult<Booking> {
        let mut booking = self.load_booking(booking_id).await?;
        if matches!(
            booking.payment_status,
            BookingPaymentStatus::Unpaid | BookingPaymentStatus::Pending
        ) {
            return Err(BookingError::Conflict(format!(
                "booking {} has an outstanding payment",
                booking.reference
            )));
        }
        booking.check_out()?;
        self.store_transition(&booking).await?;
        self.release_slot(booking.parking_slot_id).await;
        tracing::info!("Booking {} checked out", booking.reference);
        Ok(booking)
    }

    /// Cash taken at the desk
    pub async fn record_cash_payment(&self, booking_id: Uuid) -> BookingResult<Booking> {
        let mut booking = self.load_booking(booking_id).await?;
        if booking.payment_method != PaymentMethod::Cash {
            return Err(BookingError::Validation(format!(
                "booking {} is paid by {}",
                booking.reference,
                booking.payment_method.as_str()
            )));
        }
        if booking.payment_status != BookingPaymentStatus::Unpaid {
            return Err(BookingError::Conflict(format!(
                "booking {} payment is already {}",
                booking.reference,
                booking.payment_status.as_str()
            )));
        }
        if !booking.status.holds_slot() {
            return Err(BookingError::Conflict(format!(
                "booking {} is {}",
                booking.reference,
                booking.status.as_str()
            )));
        }

        let record = PaymentRecord::new(
            booking.id,
            PaymentMethod::Cash,
            booking.total_pence,
            &booking.currency,
            None,
            PaymentStatus::Succeeded,
        );
        self.repos.payments.create_payment(&record).await?;

        booking.payment_status = BookingPaymentStatus::Paid;
        booking.updated_at = Utc::now();
        self.repos
            .bookings
            .update_payment_status(booking.id, booking.payment_status)
            .await?;
        self.publish_captured(&booking, &record).await;
        Ok(booking)
    }

    /// Bookings on site or due between `from` and `to`
    pub async fn schedule(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> BookingResult<Vec<Booking>> {
        if to <= from {
            return Err(BookingError::Validation("schedule window must end after it starts".into()));
        }
        Ok(self.repos.bookings.list_overlapping(from, to).await?)
    }

    pub async fn list_invoices(
        &self,
        status: Option<InvoiceStatus>,
    ) -> BookingResult<Vec<Invoice>> {
        Ok(self.repos.invoices.list_invoices(status).await?)
    }

    pub async fn mark_invoice_paid(&self, invoice_id: Uuid) -> BookingResult<Invoice> {
        let mut invoice = self
            .repos
            .invoices
            .get_invoice(invoice_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Invoice {}", invoice_id)))?;
        let now = Utc::now();
        invoice.mark_paid(now)?;

        self.repos
            .invoices
            .update_invoice_status(invoice.id, invoice.status, invoice.paid_at)
            .await?;
        self.repos
            .bookings
            .update_payment_status(invoice.booking_id, BookingPaymentStatus::Paid)
            .await?;

        let record = PaymentRecord::new(
            invoice.booking_id,
            PaymentMethod::Invoice,
            invoice.amount_pence,
            &invoice.currency,
            Some(invoice.invoice_number.clone()),
            PaymentStatus::Succeeded,
        );
        self.repos.payments.create_payment(&record).await?;
        tracing::info!("Invoice {} paid", invoice.invoice_number);
        Ok(invoice)
    }

    // ------------------------------------------------------------------
    // Housekeeping
    // ------------------------------------------------------------------

    /// Expire bookings whose payment never arrived
    pub async fn expire_stale_bookings(&self, now: DateTime<Utc>) -> BookingResult<usize> {
        let cutoff = now - Duration::minutes(self.policy.pending_payment_ttl_minutes);
        let stale = self.repos.bookings.list_pending_before(cutoff).await?;

        let mut expired = 0;
        for mut booking in stale {
            if booking.expire().is_err() {
                continue;
            }
            if let Some(record) = self.open_payment(booking.id).await? {
                self.repos
                    .payments
                    .update_record_status(record.id, PaymentStatus::Canceled)
                    .await?;
            }
            booking.payment_status = BookingPaymentStatus::Unpaid;
            self.store_transition(&booking).await?;
            self.release_slot(booking.parking_slot_id).await;
            self.publish_cancelled(&booking, "payment window expired").await;
            expired += 1;
        }

        if expired > 0 {
            tracing::info!("Expired {} unpaid bookings", expired);
        }
        Ok(expired)
    }

    pub async fn flag_overdue_invoices(&self, now: DateTime<Utc>) -> BookingResult<usize> {
        let due = self.repos.invoices.list_issued_due_before(now).await?;
        let mut flagged = 0;
        for mut invoice in due {
            if !invoice.is_overdue(now) || invoice.mark_overdue().is_err() {
                continue;
            }
            self.repos
                .invoices
                .update_invoice_status(invoice.id, invoice.status, None)
                .await?;
            tracing::warn!(
                "Invoice {} overdue since {}",
                invoice.invoice_number,
                invoice.due_at.to_rfc3339()
            );
            flagged += 1;
        }
        Ok(flagged)
    }

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    async fn load_user(&self, user_id: Uuid) -> BookingResult<User> {
        self.repos
            .users
            .get_user(user_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("User {}", user_id)))
    }

    async fn load_booking(&self, booking_id: Uuid) -> BookingResult<Booking> {
        self.repos
            .bookings
            .get_booking(booking_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Booking {}", booking_id)))
    }

    async fn load_slot(&self, slot_id: Uuid) -> BookingResult<ParkingSlot> {
        self.repos
            .slots
            .get_slot(slot_id)
            .await?
            .ok_or_else(|| BookingError::NotFound(format!("Parking slot {}", slot_id)))
    }

    async fn owned_flight(
        &self,
        owner_id: Uuid,
        flight_id: Uuid,
    ) -> BookingResult<airpark_core::flight::Flight> {
        match self.repos.flights.get_flight(flight_id).await? {
            Some(flight) if flight.owner_id == owner_id => Ok(flight),
            _ => Err(BookingError::NotFound(format!("Flight {}", flight_id))),
        }
    }

    async fn check_vehicles(&self, owner_id: Uuid, vehicle_ids: &[Uuid]) -> BookingResult<()> {
        if vehicle_ids.is_empty() {
            return Err(BookingError::Validation("at least one vehicle is required".into()));
        }
        let mut seen = HashSet::new();
        for id in vehicle_ids {
            if !seen.insert(*id) {
                return Err(BookingError::Validation(format!("vehicle {} listed twice", id)));
            }
            match self.repos.vehicles.get_vehicle(*id).await? {
                Some(vehicle) if vehicle.owner_id == owner_id => {}
                _ => return Err(BookingError::NotFound(format!("Vehicle {}", id))),
            }
        }
        Ok(())
    }

    /// Latest gateway payment still in flight
    async fn open_payment(&self, booking_id: Uuid) -> BookingResult<Option<PaymentRecord>> {
        let records = self.repos.payments.list_payments_for_booking(booking_id).await?;
        Ok(records
            .into_iter()
            .rev()
            .find(|r| r.method.uses_gateway() && !r.status.is_terminal()))
    }

    async fn issue_invoice(
        &self,
        booking: &Booking,
        user: &User,
        now: DateTime<Utc>,
    ) -> BookingResult<Invoice> {
        let issued = self.invoicing.issue(booking, user, now)?;
        self.repos.invoices.create_invoice(&issued).await?;
        Ok(issued)
    }

    async fn store_transition(&self, booking: &Booking) -> BookingResult<()> {
        self.repos
            .bookings
            .update_booking_status(booking.id, booking.status)
            .await?;
        self.repos
            .bookings
            .update_payment_status(booking.id, booking.payment_status)
            .await?;
        Ok(())
    }

    async fn settle_captured(
        &self,
        mut booking: Booking,
        record: &PaymentRecord,
        intent: &PaymentIntent,
    ) -> BookingResult<Booking> {
        self.repos
            .payments
            .update_record_status(record.id, PaymentStatus::Succeeded)
            .await?;

        booking.payment_status = BookingPaymentStatus::Paid;
        if booking.status == BookingStatus::PendingPayment {
            booking.confirm()?;
        }
        self.store_transition(&booking).await?;

        let mut captured = record.clone();
        captured.status = PaymentStatus::Succeeded;
        captured.amount_pence = intent.amount_pence;
        self.publish_captured(&booking, &captured).await;
        self.publish_confirmed(&booking).await;
        tracing::info!("Payment {} captured for booking {}", intent.id, booking.reference);
        Ok(booking)
    }

    /// Refund or void whatever was taken. Returns the booking's new payment status.
    async fn unwind_payment(&self, booking: &Booking) -> BookingResult<BookingPaymentStatus> {
        match booking.payment_method {
            PaymentMethod::Invoice => {
                let invoice = self.repos.invoices.get_invoice_for_booking(booking.id).await?;
                if let Some(mut invoice) = invoice {
                    if invoice.void().is_ok() {
                        self.repos
                            .invoices
                            .update_invoice_status(invoice.id, invoice.status, invoice.paid_at)
                            .await?;
                        return Ok(BookingPaymentStatus::Unpaid);
                    }
                    return Ok(BookingPaymentStatus::Refunded);
                }
                Ok(booking.payment_status)
            }
            PaymentMethod::Cash => Ok(match booking.payment_status {
                BookingPaymentStatus::Paid => BookingPaymentStatus::Refunded,
                other => other,
            }),
            PaymentMethod::Card | PaymentMethod::PayPal => {
                let mut refunded = false;
                for record in self.repos.payments.list_payments_for_booking(booking.id).await? {
                    let Some(intent_id) = record.provider_reference.as_deref() else {
                        continue;
                    };
                    match record.status {
                        PaymentStatus::Succeeded => {
                            let status = self
                                .payments
                                .refund(record.method, intent_id, record.amount_pence)
                                .await?;
                            self.repos.payments.update_record_status(record.id, status).await?;
                            refunded = true;
                        }
                        s if !s.is_terminal() => {
                            self.repos
                                .payments
                                .update_record_status(record.id, PaymentStatus::Canceled)
                                .await?;
                        }
                        _ => {}
                    }
                }
                Ok(if refunded {
                    BookingPaymentStatus::Refunded
                } else {
                    BookingPaymentStatus::Unpaid
                })
            }
        }
    }

    /// Put a slot back into the pool. Failures are logged; the booking change stands.
    async fn release_slot(&self, slot_id: Uuid) {
        let slot = match self.repos.slots.get_slot(slot_id).await {
            Ok(Some(slot)) => slot,
            Ok(None) => {
                tracing::warn!("Slot {} vanished before release", slot_id);
                return;
            }
            Err(e) => {
                tracing::error!("Failed to load slot {} for release: {}", slot_id, e);
                return;
            }
        };
        if slot.status == SlotStatus::Available {
            return;
        }
        match self.repos.slots.set_status(slot_id, SlotStatus::Available).await {
            Ok(Some(slot)) => self.publish_slot(&slot).await,
            Ok(None) => tracing::warn!("Slot {} vanished during release", slot_id),
            Err(e) => tracing::error!("Failed to release slot {}: {}", slot_id, e),
        }
    }

    async fn publish_slot(&self, slot: &ParkingSlot) {
        publish_json(
            self.events.as_ref(),
            TOPIC_SLOT_STATUS,
            &slot.id.to_string(),
            &slot.status_event(),
        )
        .await;
    }

    async fn publish_confirmed(&self, booking: &Booking) {
        publish_json(
            self.events.as_ref(),
            TOPIC_BOOKING_CONFIRMED,
            &booking.id.to_string(),
            &BookingConfirmedEvent {
                booking_id: booking.id,
                reference: booking.reference.clone(),
                user_id: booking.user_id,
                parking_slot_id: booking.parking_slot_id,
                total_pence: booking.total_pence,
                payment_method: booking.payment_method.as_str().to_string(),
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;
    }

    async fn publish_cancelled(&self, booking: &Booking, reason: &str) {
        publish_json(
            self.events.as_ref(),
            TOPIC_BOOKING_CANCELLED,
            &booking.id.to_string(),
            &BookingCancelledEvent {
                booking_id: booking.id,
                reference: booking.reference.clone(),
                reason: reason.to_string(),
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;
    }

    async fn publish_captured(&self, booking: &Booking, record: &PaymentRecord) {
        publish_json(
            self.events.as_ref(),
            TOPIC_PAYMENT_CAPTURED,
            &booking.id.to_string(),
            &PaymentCapturedEvent {
                booking_id: booking.id,
                method: record.method.as_str().to_string(),
                provider_reference: record.provider_reference.clone(),
                amount_pence: record.amount_pence,
                currency: record.currency.clone(),
                timestamp: Utc::now().timestamp(),
            },
        )
        .await;
    }
}
