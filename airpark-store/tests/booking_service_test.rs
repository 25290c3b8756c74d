use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use airpark_booking::{
    Actor, Booking, BookingError, BookingFilter, BookingPaymentStatus, BookingPolicy,
    BookingRepository, BookingService, BookingStatus, CreateBooking, Invoice, InvoiceRepository,
    InvoiceStatus, MockPaymentAdapter, PaymentOrchestrator, QuoteRequest, Repositories,
    UpdateBooking,
};
use airpark_catalog::{NewTariff, ParkingSlot, SlotStatus, TariffKind};
use airpark_core::fleet::VehicleInput;
use airpark_core::flight::FlightInput;
use airpark_core::identity::{CustomerType, NewUser, Role};
use airpark_core::payment::{PaymentAdapter, PaymentMethod};
use airpark_core::repository::{
    FlightRepository, ParkingSlotRepository, TariffRepository, UserRepository, VehicleRepository,
};
use airpark_core::RepoResult;
use airpark_store::{memory_repositories, InMemoryStore, RecordingPublisher};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

struct Fixture {
    store: Arc<InMemoryStore>,
    events: Arc<RecordingPublisher>,
    card: Arc<MockPaymentAdapter>,
    service: BookingService,
    tariff_id: Uuid,
}

struct Customer {
    actor: Actor,
    flight_id: Uuid,
    vehicle_id: Uuid,
}

/// Booking store whose status writes fail a set number of times
struct FlakyBookings {
    inner: Arc<InMemoryStore>,
    status_failures: AtomicUsize,
}

impl FlakyBookings {
    fn new(inner: Arc<InMemoryStore>, status_failures: usize) -> Self {
        Self {
            inner,
            status_failures: AtomicUsize::new(status_failures),
        }
    }
}

#[async_trait]
impl BookingRepository for FlakyBookings {
    async fn create_booking(&self, booking: &Booking) -> RepoResult<()> {
        self.inner.create_booking(booking).await
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        self.inner.get_booking(id).await
    }

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Booking>> {
        self.inner.find_by_reference(reference).await
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        self.inner.list_bookings_for_user(user_id).await
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> RepoResult<Vec<Booking>> {
        self.inner.list_bookings(filter).await
    }

    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool> {
        self.inner.update_booking(booking).await
    }

    async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> RepoResult<bool> {
        let failing = self
            .status_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err("connection reset".into());
        }
        self.inner.update_booking_status(id, status).await
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: BookingPaymentStatus,
    ) -> RepoResult<bool> {
        self.inner.update_payment_status(id, status).await
    }

    async fn delete_booking(&self, id: Uuid) -> RepoResult<bool> {
        self.inner.delete_booking(id).await
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Booking>> {
        self.inner.list_pending_before(cutoff).await
    }

    async fn list_overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Booking>> {
        self.inner.list_overlapping(from, to).await
    }
}

/// Invoice store that cannot insert
struct ReadOnlyInvoices {
    inner: Arc<InMemoryStore>,
}

#[async_trait]
impl InvoiceRepository for ReadOnlyInvoices {
    async fn create_invoice(&self, _invoice: &Invoice) -> RepoResult<()> {
        Err("invoice table is read-only".into())
    }

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Option<Invoice>> {
        self.inner.get_invoice(id).await
    }

    async fn get_invoice_for_booking(&self, booking_id: Uuid) -> RepoResult<Option<Invoice>> {
        self.inner.get_invoice_for_booking(booking_id).await
    }

    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> RepoResult<Vec<Invoice>> {
        self.inner.list_invoices(status).await
    }

    async fn list_invoices_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Invoice>> {
        self.inner.list_invoices_for_user(user_id).await
    }

    async fn update_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepoResult<bool> {
        self.inner.update_invoice_status(id, status, paid_at).await
    }

    async fn list_issued_due_before(&self, now: DateTime<Utc>) -> RepoResult<Vec<Invoice>> {
        self.inner.list_issued_due_before(now).await
    }
}

async fn fixture(slots: i32) -> Fixture {
    fixture_with(slots, |_, _| {}).await
}

async fn fixture_with(
    slots: i32,
    wire: impl FnOnce(&Arc<InMemoryStore>, &mut Repositories),
) -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let events = Arc::new(RecordingPublisher::new());
    let card = Arc::new(MockPaymentAdapter::new("mock_card"));
    let paypal = Arc::new(MockPaymentAdapter::new("mock_paypal"));

    for n in 1..=slots {
        store.create_slot(&ParkingSlot::new(n, Some("A".into())).unwrap()).await.unwrap();
    }

    let tariff = NewTariff {
        kind: TariffKind::ParkingSlot,
        name: "Standard".into(),
        description: None,
        daily_rate_pence: 1200,
        service_fee_pence: 0,
        is_active: true,
    }
    .into_tariff()
    .unwrap();
    store.create_tariff(&tariff).await.unwrap();

    let policy = BookingPolicy {
        booking_fee_pence: 250,
        invoice_due_days: 30,
        pending_payment_ttl_minutes: 30,
        currency: "GBP".into(),
    };
    let mut repos = memory_repositories(store.clone());
    wire(&store, &mut repos);
    let service = BookingService::new(
        repos,
        Arc::new(PaymentOrchestrator::new(card.clone(), paypal)),
        events.clone(),
        policy,
    );

    Fixture {
        store,
        events,
        card,
        service,
        tariff_id: tariff.id,
    }
}

async fn customer(fx: &Fixture, email: &str, customer_type: CustomerType) -> Customer {
    let company_name = (customer_type == CustomerType::Corporate).then(|| "Acme Ltd".to_string());
    let user = NewUser {
        email: email.into(),
        password: "correct horse".into(),
        full_name: "Test Customer".into(),
        phone: None,
        customer_type,
        company_name,
    }
    .into_user()
    .unwrap();
    fx.store.create_user(&user).await.unwrap();

    let departure = Utc.with_ymd_and_hms(2030, 6, 1, 9, 30, 0).unwrap();
    let flight = FlightInput {
        outbound_flight_number: "BA2490".into(),
        departure_at: departure,
        return_flight_number: "BA2491".into(),
        return_at: departure + Duration::days(3),
        destination: "Lisbon".into(),
    }
    .into_flight(user.id)
    .unwrap();
    fx.store.create_flight(&flight).await.unwrap();

    let vehicle = VehicleInput {
        registration: "AB12 CDE".into(),
        make: "Ford".into(),
        model: "Focus".into(),
        colour: None,
    }
    .into_vehicle(user.id)
    .unwrap();
    fx.store.create_vehicle(&vehicle).await.unwrap();

    Customer {
        actor: Actor::new(user.id, Role::Customer),
        flight_id: flight.id,
        vehicle_id: vehicle.id,
    }
}

fn request(fx: &Fixture, c: &Customer, method: PaymentMethod) -> CreateBooking {
    CreateBooking {
        flight_id: c.flight_id,
        tariff_id: fx.tariff_id,
        vehicle_ids: vec![c.vehicle_id],
        payment_method: method,
    }
}

fn staff() -> Actor {
    Actor::new(Uuid::new_v4(), Role::Staff)
}

#[tokio::test]
async fn test_quote_counts_days_and_fees() {
    let fx = fixture(1).await;
    let c = customer(&fx, "quote@example.com", CustomerType::Personal).await;

    let quote = fx
        .service
        .quote(
            &c.actor,
            &QuoteRequest {
                flight_id: c.flight_id,
                tariff_id: fx.tariff_id,
            },
        )
        .await
        .unwrap();

    assert_eq!(quote.days, 3);
    assert_eq!(quote.total_pence, 3 * 1200 + 250);
}

#[tokio::test]
async fn test_cash_booking_is_confirmed_in_first_slot() {
    let fx = fixture(3).await;
    let c = customer(&fx, "cash@example.com", CustomerType::Personal).await;

    let created = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Cash))
        .await
        .unwrap();

    let booking = created.booking;
    assert_eq!(booking.status, BookingStatus::Confirmed);
    assert_eq!(booking.payment_status, BookingPaymentStatus::Unpaid);
    assert_eq!(booking.total_pence, 3850);
    assert!(booking.reference.starts_with("AP-"));
    assert!(created.payment.is_none());

    let slot = fx.store.get_slot(booking.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.number, 1);
    assert_eq!(slot.status, SlotStatus::Reserved);

    assert!(fx.events.topics().await.contains(&"booking.confirmed".to_string()));
}

#[tokio::test]
async fn test_card_booking_pays_through_gateway() {
    let fx = fixture(2).await;
    let c = customer(&fx, "card@example.com", CustomerType::Personal).await;

    let created = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await
        .unwrap();
    assert_eq!(created.booking.status, BookingStatus::PendingPayment);
    let intent = created.payment.expect("card bookings return an intent");
    assert!(intent.client_secret.is_some());

    let paid = fx.service.pay_booking(&c.actor, created.booking.id).await.unwrap();
    assert_eq!(paid.status, BookingStatus::Confirmed);
    assert_eq!(paid.payment_status, BookingPaymentStatus::Paid);

    let topics = fx.events.topics().await;
    assert!(topics.contains(&"payment.captured".to_string()));

    // Second attempt has nothing to capture
    let again = fx.service.pay_booking(&c.actor, created.booking.id).await;
    assert!(matches!(again, Err(BookingError::Conflict(_))));
}

#[tokio::test]
async fn test_declined_card_payment() {
    let fx = fixture(1).await;
    let c = customer(&fx, "declined@example.com", CustomerType::Personal).await;
    let created = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await
        .unwrap();

    fx.card.set_decline(true);
    let result = fx.service.pay_booking(&c.actor, created.booking.id).await;
    assert!(matches!(result, Err(BookingError::PaymentDeclined(_))));
}

#[tokio::test]
async fn test_gateway_outage_rolls_back_booking() {
    let fx = fixture(1).await;
    let c = customer(&fx, "outage@example.com", CustomerType::Personal).await;
    fx.card.set_outage(true);

    let result = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await;
    assert!(matches!(result, Err(BookingError::Gateway(_))));

    // Slot is free again and nothing was persisted
    let slots = fx.store.list_slots().await.unwrap();
    assert_eq!(slots[0].status, SlotStatus::Available);
    assert!(fx.service.list_my_bookings(&c.actor).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_corporate_customers_are_invoiced() {
    let fx = fixture(1).await;
    let c = customer(&fx, "corp@example.com", CustomerType::Corporate).await;

    // Requested card, forced to invoice
    let created = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await
        .unwrap();
    assert_eq!(created.booking.payment_method, PaymentMethod::Invoice);
    assert_eq!(created.booking.status, BookingStatus::Confirmed);
    assert_eq!(created.booking.payment_status, BookingPaymentStatus::Invoiced);

    let invoice = created.invoice.expect("invoice issued");
    assert_eq!(invoice.amount_pence, created.booking.total_pence);
    assert_eq!(invoice.company_name.as_deref(), Some("Acme Ltd"));
    assert_eq!(invoice.due_at - invoice.issued_at, Duration::days(30));
    assert!(fx.events.topics().await.contains(&"invoice.issued".to_string()));

    let paid = fx.service.mark_invoice_paid(invoice.id).await.unwrap();
    assert_eq!(paid.status, InvoiceStatus::Paid);
    let booking = fx.service.get_booking(&c.actor, created.booking.id).await.unwrap();
    assert_eq!(booking.payment_status, BookingPaymentStatus::Paid);
}

#[tokio::test]
async fn test_personal_customer_cannot_choose_invoice() {
    let fx = fixture(1).await;
    let c = customer(&fx, "personal@example.com", CustomerType::Personal).await;
    let result = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Invoice))
        .await;
    assert!(matches!(result, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn test_full_car_park() {
    let fx = fixture(1).await;
    let a = customer(&fx, "a@example.com", CustomerType::Personal).await;
    let b = customer(&fx, "b@example.com", CustomerType::Personal).await;

    fx.service
        .create_booking(&a.actor, request(&fx, &a, PaymentMethod::Cash))
        .await
        .unwrap();
    let result = fx
        .service
        .create_booking(&b.actor, request(&fx, &b, PaymentMethod::Cash))
        .await;
    assert!(matches!(result, Err(BookingError::NoSlotAvailable)));
}

#[tokio::test]
async fn test_foreign_vehicle_and_duplicates_rejected() {
    let fx = fixture(2).await;
    let a = customer(&fx, "owner@example.com", CustomerType::Personal).await;
    let b = customer(&fx, "other@example.com", CustomerType::Personal).await;

    let mut req = request(&fx, &a, PaymentMethod::Cash);
    req.vehicle_ids = vec![b.vehicle_id];
    let result = fx.service.create_booking(&a.actor, req).await;
    assert!(matches!(result, Err(BookingError::NotFound(_))));

    let mut req = request(&fx, &a, PaymentMethod::Cash);
    req.vehicle_ids = vec![a.vehicle_id, a.vehicle_id];
    let result = fx.service.create_booking(&a.actor, req).await;
    assert!(matches!(result, Err(BookingError::Validation(_))));

    let mut req = request(&fx, &a, PaymentMethod::Cash);
    req.vehicle_ids.clear();
    let result = fx.service.create_booking(&a.actor, req).await;
    assert!(matches!(result, Err(BookingError::Validation(_))));
}

#[tokio::test]
async fn test_cancel_refunds_and_releases_slot() {
    let fx = fixture(1).await;
    let c = customer(&fx, "cancel@example.com", CustomerType::Personal).await;
    let created = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await
        .unwrap();
    fx.service.pay_booking(&c.actor, created.booking.id).await.unwrap();

    // Another customer can't see it
    let stranger = Actor::new(Uuid::new_v4(), Role::Customer);
    assert!(matches!(
        fx.service.cancel_booking(&stranger, created.booking.id).await,
        Err(BookingError::NotFound(_))
    ));

    let cancelled = fx.service.cancel_booking(&c.actor, created.booking.id).await.unwrap();
    assert_eq!(cancelled.status, BookingStatus::Cancelled);
    assert_eq!(cancelled.payment_status, BookingPaymentStatus::Refunded);

    let slot = fx.store.get_slot(created.booking.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Available);

    // Terminal
    assert!(matches!(
        fx.service.cancel_booking(&c.actor, created.booking.id).await,
        Err(BookingError::InvalidTransition { .. })
    ));
}

#[tokio::test]
async fn test_check_in_and_out_with_cash() {
    let fx = fixture(1).await;
    let c = customer(&fx, "desk@example.com", CustomerType::Personal).await;
    let booking = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Cash))
        .await
        .unwrap()
        .booking;

    let checked_in = fx.service.check_in(booking.id).await.unwrap();
    assert_eq!(checked_in.status, BookingStatus::CheckedIn);
    let slot = fx.store.get_slot(booking.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Occupied);

    // Cash still owed
    assert!(matches!(
        fx.service.check_out(booking.id).await,
        Err(BookingError::Conflict(_))
    ));

    let paid = fx.service.record_cash_payment(booking.id).await.unwrap();
    assert_eq!(paid.payment_status, BookingPaymentStatus::Paid);

    let done = fx.service.check_out(booking.id).await.unwrap();
    assert_eq!(done.status, BookingStatus::Completed);
    let slot = fx.store.get_slot(booking.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Available);
}

#[tokio::test]
async fn test_check_in_retry_after_write_failure() {
    let fx = fixture_with(1, |store, repos| {
        repos.bookings = Arc::new(FlakyBookings::new(store.clone(), 1));
    })
    .await;
    let c = customer(&fx, "retry@example.com", CustomerType::Personal).await;
    let booking = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Cash))
        .await
        .unwrap()
        .booking;

    let first = fx.service.check_in(booking.id).await;
    assert!(matches!(first, Err(BookingError::Repository(_))));

    // Booking and slot still agree
    let stored = fx.store.get_booking(booking.id).await.unwrap().unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);
    let slot = fx.store.get_slot(booking.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Reserved);

    let retried = fx.service.check_in(booking.id).await.unwrap();
    assert_eq!(retried.status, BookingStatus::CheckedIn);
    let slot = fx.store.get_slot(booking.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Occupied);
}

#[tokio::test]
async fn test_invoice_failure_rolls_back_booking() {
    let fx = fixture_with(1, |store, repos| {
        repos.invoices = Arc::new(ReadOnlyInvoices { inner: store.clone() });
    })
    .await;
    let c = customer(&fx, "ap@acme.test", CustomerType::Corporate).await;

    let result = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Invoice))
        .await;
    assert!(matches!(result, Err(BookingError::Repository(_))));

    let slots = fx.store.list_slots().await.unwrap();
    assert_eq!(slots[0].status, SlotStatus::Available);
    assert!(fx.service.list_my_bookings(&c.actor).await.unwrap().is_empty());
    assert!(!fx.events.topics().await.contains(&"booking.confirmed".to_string()));
}

#[tokio::test]
async fn test_gateway_update_follows_recorded_method() {
    let fx = fixture(1).await;
    let c = customer(&fx, "mixed@example.com", CustomerType::Personal).await;
    let created = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await
        .unwrap();
    let intent_id = created.payment.unwrap().id;
    fx.card.capture_payment(&intent_id).await.unwrap();

    // Card intent reported through the PayPal channel
    let updated = fx
        .service
        .apply_gateway_update(PaymentMethod::PayPal, &intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.status, BookingStatus::Confirmed);
    assert_eq!(updated.payment_status, BookingPaymentStatus::Paid);
}

#[tokio::test]
async fn test_webhook_update_is_idempotent() {
    let fx = fixture(1).await;
    let c = customer(&fx, "hook@example.com", CustomerType::Personal).await;
    let created = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await
        .unwrap();
    let intent_id = created.payment.unwrap().id;

    // Customer completed payment out of band
    fx.card.capture_payment(&intent_id).await.unwrap();

    let first = fx
        .service
        .apply_gateway_update(PaymentMethod::Card, &intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.status, BookingStatus::Confirmed);

    let second = fx
        .service
        .apply_gateway_update(PaymentMethod::Card, &intent_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.status, BookingStatus::Confirmed);

    let captured = fx
        .events
        .topics()
        .await
        .into_iter()
        .filter(|t| t == "payment.captured")
        .count();
    assert_eq!(captured, 1);

    assert!(fx
        .service
        .apply_gateway_update(PaymentMethod::Card, "pi_unknown")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_housekeeping() {
    let fx = fixture(2).await;
    let c = customer(&fx, "late@example.com", CustomerType::Personal).await;
    let pending = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Card))
        .await
        .unwrap()
        .booking;

    assert_eq!(fx.service.expire_stale_bookings(Utc::now()).await.unwrap(), 0);
    let later = Utc::now() + Duration::minutes(31);
    assert_eq!(fx.service.expire_stale_bookings(later).await.unwrap(), 1);

    let expired = fx.service.get_booking(&staff(), pending.id).await.unwrap();
    assert_eq!(expired.status, BookingStatus::Expired);
    let slot = fx.store.get_slot(pending.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Available);

    let corp = customer(&fx, "corp-late@example.com", CustomerType::Corporate).await;
    fx.service
        .create_booking(&corp.actor, request(&fx, &corp, PaymentMethod::Invoice))
        .await
        .unwrap();
    assert_eq!(fx.service.flag_overdue_invoices(Utc::now()).await.unwrap(), 0);
    let overdue = Utc::now() + Duration::days(31);
    assert_eq!(fx.service.flag_overdue_invoices(overdue).await.unwrap(), 1);
    assert_eq!(
        fx.service.list_invoices(Some(InvoiceStatus::Overdue)).await.unwrap().len(),
        1
    );
}

#[tokio::test]
async fn test_staff_edit_and_schedule() {
    let fx = fixture(2).await;
    let c = customer(&fx, "edit@example.com", CustomerType::Personal).await;
    let booking = fx
        .service
        .create_booking(&c.actor, request(&fx, &c, PaymentMethod::Cash))
        .await
        .unwrap()
        .booking;

    let valet = NewTariff {
        kind: TariffKind::FullValet,
        name: "Full Valet".into(),
        description: None,
        daily_rate_pence: 1200,
        service_fee_pence: 3500,
        is_active: true,
    }
    .into_tariff()
    .unwrap();
    fx.store.create_tariff(&valet).await.unwrap();

    let updated = fx
        .service
        .update_booking(
            booking.id,
            UpdateBooking {
                tariff_id: Some(valet.id),
                ..UpdateBooking::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.total_pence, 3850 + 3500);

    let window = fx
        .service
        .schedule(booking.drop_off_at - Duration::days(1), booking.drop_off_at + Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(window.len(), 1);

    assert!(matches!(
        fx.service.schedule(booking.pick_up_at, booking.drop_off_at).await,
        Err(BookingError::Validation(_))
    ));

    fx.service.delete_booking(booking.id).await.unwrap();
    let slot = fx.store.get_slot(booking.parking_slot_id).await.unwrap().unwrap();
    assert_eq!(slot.status, SlotStatus::Available);
}
