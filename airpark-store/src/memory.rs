//! In-process implementations of every repository, for tests and database-less runs.

use std::collections::HashMap;

use airpark_booking::models::{
    Booking, BookingFilter, BookingPaymentStatus, BookingStatus, Invoice, InvoiceStatus,
    PaymentRecord,
};
use airpark_booking::repository::{BookingRepository, InvoiceRepository, PaymentRepository};
use airpark_catalog::{ParkingSlot, SlotStatus, Tariff};
use airpark_core::events::EventPublisher;
use airpark_core::fleet::Vehicle;
use airpark_core::flight::Flight;
use airpark_core::identity::{Role, User};
use airpark_core::payment::PaymentStatus;
use airpark_core::repository::{
    FlightRepository, ParkingSlotRepository, TariffRepository, UserRepository, VehicleRepository,
};
use airpark_core::RepoResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

#[derive(Default)]
pub struct InMemoryStore {
    users: RwLock<HashMap<Uuid, User>>,
    vehicles: RwLock<HashMap<Uuid, Vehicle>>,
    flights: RwLock<HashMap<Uuid, Flight>>,
    tariffs: RwLock<HashMap<Uuid, Tariff>>,
    // One lock for all slots so reservation is atomic
    slots: RwLock<HashMap<Uuid, ParkingSlot>>,
    bookings: RwLock<HashMap<Uuid, Booking>>,
    invoices: RwLock<HashMap<Uuid, Invoice>>,
    payments: RwLock<Vec<PaymentRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn unique_violation(what: &str, value: &str) -> airpark_core::RepoError {
    format!("duplicate {}: {}", what, value).into()
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn create_user(&self, user: &User) -> RepoResult<()> {
        let mut users = self.users.write().await;
        if users.values().any(|u| u.email == user.email) {
            return Err(unique_violation("email", &user.email));
        }
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        Ok(self.users.read().await.values().find(|u| u.email == email).cloned())
    }

    async fn list_users(&self) -> RepoResult<Vec<User>> {
        let mut users: Vec<User> = self.users.read().await.values().cloned().collect();
        users.sort_by_key(|u| u.created_at);
        Ok(users)
    }

    async fn update_role(&self, id: Uuid, role: Role) -> RepoResult<bool> {
        Ok(match self.users.write().await.get_mut(&id) {
            Some(user) => {
                user.role = role;
                true
            }
            None => false,
        })
    }
}

#[async_trait]
impl VehicleRepository for InMemoryStore {
    async fn create_vehicle(&self, vehicle: &Vehicle) -> RepoResult<()> {
        let mut vehicles = self.vehicles.write().await;
        if vehicles
            .values()
            .any(|v| v.owner_id == vehicle.owner_id && v.registration == vehicle.registration)
        {
            return Err(unique_violation("registration", &vehicle.registration));
        }
        vehicles.insert(vehicle.id, vehicle.clone());
        Ok(())
    }

    async fn get_vehicle(&self, id: Uuid) -> RepoResult<Option<Vehicle>> {
        Ok(self.vehicles.read().await.get(&id).cloned())
    }

    async fn list_vehicles(&self, owner_id: Uuid) -> RepoResult<Vec<Vehicle>> {
        let mut vehicles: Vec<Vehicle> = self
            .vehicles
            .read()
            .await
            .values()
            .filter(|v| v.owner_id == owner_id)
            .cloned()
            .collect();
        vehicles.sort_by_key(|v| v.created_at);
        Ok(vehicles)
    }

    async fn update_vehicle(&self, vehicle: &Vehicle) -> RepoResult<bool> {
        let mut vehicles = self.vehicles.write().await;
        if !vehicles.contains_key(&vehicle.id) {
            return Ok(false);
        }
        vehicles.insert(vehicle.id, vehicle.clone());
        Ok(true)
    }

    async fn delete_vehicle(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.vehicles.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl FlightRepository for InMemoryStore {
    async fn create_flight(&self, flight: &Flight) -> RepoResult<()> {
        self.flights.write().await.insert(flight.id, flight.clone());
        Ok(())
    }

    async fn get_flight(&self, id: Uuid) -> RepoResult<Option<Flight>> {
        Ok(self.flights.read().await.get(&id).cloned())
    }

    async fn list_flights(&self, owner_id: Uuid) -> RepoResult<Vec<Flight>> {
        let mut flights: Vec<Flight> = self
            .flights
            .read()
            .await
            .values()
            .filter(|f| f.owner_id == owner_id)
            .cloned()
            .collect();
        flights.sort_by_key(|f| f.departure_at);
        Ok(flights)
    }

    async fn update_flight(&self, flight: &Flight) -> RepoResult<bool> {
        let mut flights = self.flights.write().await;
        if !flights.contains_key(&flight.id) {
            return Ok(false);
        }
        flights.insert(flight.id, flight.clone());
        Ok(true)
    }

    async fn delete_flight(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.flights.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl TariffRepository for InMemoryStore {
    async fn create_tariff(&self, tariff: &Tariff) -> RepoResult<()> {
        self.tariffs.write().await.insert(tariff.id, tariff.clone());
        Ok(())
    }

    async fn get_tariff(&self, id: Uuid) -> RepoResult<Option<Tariff>> {
        Ok(self.tariffs.read().await.get(&id).cloned())
    }

    async fn list_tariffs(&self, active_only: bool) -> RepoResult<Vec<Tariff>> {
        let mut tariffs: Vec<Tariff> = self
            .tariffs
            .read()
            .await
            .values()
            .filter(|t| !active_only || t.is_active)
            .cloned()
            .collect();
        tariffs.sort_by(|a, b| {
            let a_key = (a.daily_rate_pence + a.service_fee_pence, &a.name);
            a_key.cmp(&(b.daily_rate_pence + b.service_fee_pence, &b.name))
        });
        Ok(tariffs)
    }

    async fn update_tariff(&self, tariff: &Tariff) -> RepoResult<bool> {
        let mut tariffs = self.tariffs.write().await;
        if !tariffs.contains_key(&tariff.id) {
            return Ok(false);
        }
        tariffs.insert(tariff.id, tariff.clone());
        Ok(true)
    }

    async fn delete_tariff(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.tariffs.write().await.remove(&id).is_some())
    }
}

#[async_trait]
impl ParkingSlotRepository for InMemoryStore {
    async fn create_slot(&self, slot: &ParkingSlot) -> RepoResult<()> {
        let mut slots = self.slots.write().await;
        if slots.values().any(|s| s.number == slot.number) {
            return Err(unique_violation("slot number", &slot.number.to_string()));
        }
        slots.insert(slot.id, slot.clone());
        Ok(())
    }

    async fn get_slot(&self, id: Uuid) -> RepoResult<Option<ParkingSlot>> {
        Ok(self.slots.read().await.get(&id).cloned())
    }

    async fn list_slots(&self) -> RepoResult<Vec<ParkingSlot>> {
        let mut slots: Vec<ParkingSlot> = self.slots.read().await.values().cloned().collect();
        slots.sort_by_key(|s| s.number);
        Ok(slots)
    }

    async fn rename_slot(
        &self,
        id: Uuid,
        number: i32,
        zone: Option<String>,
    ) -> RepoResult<Option<ParkingSlot>> {
        let mut slots = self.slots.write().await;
        if slots.values().any(|s| s.number == number && s.id != id) {
            return Err(unique_violation("slot number", &number.to_string()));
        }
        Ok(slots.get_mut(&id).map(|slot| {
            slot.number = number;
            slot.zone = zone;
            slot.updated_at = Utc::now();
            slot.clone()
        }))
    }

    async fn delete_slot(&self, id: Uuid) -> RepoResult<bool> {
        Ok(self.slots.write().await.remove(&id).is_some())
    }

    async fn reserve_first_available(&self) -> RepoResult<Option<ParkingSlot>> {
        let mut slots = self.slots.write().await;
        let snapshot: Vec<ParkingSlot> = slots.values().cloned().collect();
        let Some(id) = airpark_catalog::inventory::first_available(&snapshot).map(|s| s.id) else {
            return Ok(None);
        };
        let Some(slot) = slots.get_mut(&id) else {
            return Ok(None);
        };
        slot.reserve()?;
        Ok(Some(slot.clone()))
    }

    async fn set_status(&self, id: Uuid, status: SlotStatus) -> RepoResult<Option<ParkingSlot>> {
        Ok(self.slots.write().await.get_mut(&id).map(|slot| {
            slot.status = status;
            slot.updated_at = Utc::now();
            slot.clone()
        }))
    }

    async fn max_number(&self) -> RepoResult<Option<i32>> {
        Ok(self.slots.read().await.values().map(|s| s.number).max())
    }
}

#[async_trait]
impl BookingRepository for InMemoryStore {
    async fn create_booking(&self, booking: &Booking) -> RepoResult<()> {
        let mut bookings = self.bookings.write().await;
        if bookings.values().any(|b| b.reference == booking.reference) {
            return Err(unique_violation("booking reference", &booking.reference));
        }
        bookings.insert(booking.id, booking.clone());
        Ok(())
    }

    async fn get_booking(&self, id: Uuid) -> RepoResult<Option<Booking>> {
        Ok(self.bookings.read().await.get(&id).cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> RepoResult<Option<Booking>> {
        Ok(self
            .bookings
            .read()
            .await
            .values()
            .find(|b| b.reference == reference)
            .cloned())
    }

    async fn list_bookings_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn list_bookings(&self, filter: &BookingFilter) -> RepoResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| filter.matches(b))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.drop_off_at);
        Ok(bookings)
    }

    async fn update_booking(&self, booking: &Booking) -> RepoResult<bool> {
        let mut bookings = self.bookings.write().await;
        if !bookings.contains_key(&booking.id) {
            return Ok(false);
        }
        bookings.insert(booking.id, booking.clone());
        Ok(true)
    }

    async fn update_booking_status(&self, id: Uuid, status: BookingStatus) -> RepoResult<bool> {
        Ok(match self.bookings.write().await.get_mut(&id) {
            Some(booking) => {
                booking.status = status;
                booking.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn update_payment_status(
        &self,
        id: Uuid,
        status: BookingPaymentStatus,
    ) -> RepoResult<bool> {
        Ok(match self.bookings.write().await.get_mut(&id) {
            Some(booking) => {
                booking.payment_status = status;
                booking.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete_booking(&self, id: Uuid) -> RepoResult<bool> {
        let removed = self.bookings.write().await.remove(&id).is_some();
        if removed {
            // Mirror ON DELETE CASCADE
            self.invoices.write().await.retain(|_, i| i.booking_id != id);
            self.payments.write().await.retain(|p| p.booking_id != id);
        }
        Ok(removed)
    }

    async fn list_pending_before(&self, cutoff: DateTime<Utc>) -> RepoResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status == BookingStatus::PendingPayment && b.created_at < cutoff)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn list_overlapping(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> RepoResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.status.holds_slot() && b.overlaps(from, to))
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.drop_off_at);
        Ok(bookings)
    }
}

#[async_trait]
impl InvoiceRepository for InMemoryStore {
    async fn create_invoice(&self, invoice: &Invoice) -> RepoResult<()> {
        self.invoices.write().await.insert(invoice.id, invoice.clone());
        Ok(())
    }

    async fn get_invoice(&self, id: Uuid) -> RepoResult<Option<Invoice>> {
        Ok(self.invoices.read().await.get(&id).cloned())
    }

    async fn get_invoice_for_booking(&self, booking_id: Uuid) -> RepoResult<Option<Invoice>> {
        Ok(self
            .invoices
            .read()
            .await
            .values()
            .filter(|i| i.booking_id == booking_id)
            .max_by_key(|i| i.issued_at)
            .cloned())
    }

    async fn list_invoices(&self, status: Option<InvoiceStatus>) -> RepoResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .read()
            .await
            .values()
            .filter(|i| status.map_or(true, |s| i.status == s))
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices)
    }

    async fn list_invoices_for_user(&self, user_id: Uuid) -> RepoResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .read()
            .await
            .values()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect();
        invoices.sort_by(|a, b| b.issued_at.cmp(&a.issued_at));
        Ok(invoices)
    }

    async fn update_invoice_status(
        &self,
        id: Uuid,
        status: InvoiceStatus,
        paid_at: Option<DateTime<Utc>>,
    ) -> RepoResult<bool> {
        Ok(match self.invoices.write().await.get_mut(&id) {
            Some(invoice) => {
                invoice.status = status;
                invoice.paid_at = paid_at;
                true
            }
            None => false,
        })
    }

    async fn list_issued_due_before(&self, now: DateTime<Utc>) -> RepoResult<Vec<Invoice>> {
        let mut invoices: Vec<Invoice> = self
            .invoices
            .read()
            .await
            .values()
            .filter(|i| i.status == InvoiceStatus::Issued && i.due_at < now)
            .cloned()
            .collect();
        invoices.sort_by_key(|i| i.due_at);
        Ok(invoices)
    }
}

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create_payment(&self, record: &PaymentRecord) -> RepoResult<()> {
        self.payments.write().await.push(record.clone());
        Ok(())
    }

    async fn find_by_provider_reference(
        &self,
        reference: &str,
    ) -> RepoResult<Option<PaymentRecord>> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .rev()
            .find(|p| p.provider_reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn list_payments_for_booking(&self, booking_id: Uuid) -> RepoResult<Vec<PaymentRecord>> {
        Ok(self
            .payments
            .read()
            .await
            .iter()
            .filter(|p| p.booking_id == booking_id)
            .cloned()
            .collect())
    }

    async fn update_record_status(&self, id: Uuid, status: PaymentStatus) -> RepoResult<bool> {
        Ok(match self.payments.write().await.iter_mut().find(|p| p.id == id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        })
    }
}

/// Publisher that keeps every event, for assertions
#[derive(Default)]
pub struct RecordingPublisher {
    events: Mutex<Vec<(String, String, String)>>,
}

impl RecordingPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(topic, key, payload)` in publish order
    pub async fn events(&self) -> Vec<(String, String, String)> {
        self.events.lock().await.clone()
    }

    pub async fn topics(&self) -> Vec<String> {
        self.events.lock().await.iter().map(|(t, _, _)| t.clone()).collect()
    }
}

#[async_trait]
impl EventPublisher for RecordingPublisher {
    async fn publish(
        &self,
        topic: &str,
        key: &str,
        payload: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.events
            .lock()
            .await
            .push((topic.to_string(), key.to_string(), payload.to_string()));
        Ok(())
    }
}
