use airpark_catalog::{ParkingSlot, SlotStatus, Tariff};
use async_trait::async_trait;
use uuid::Uuid;

use crate::fleet::Vehicle;
use crate::flight::Flight;
use crate::identity::{Role, User};
use crate::RepoResult;

/// Repository trait for identity/membership data
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create_user(&self, user: &User) -> RepoResult<()>;

    async fn get_user(&self, id: Uuid) -> RepoResult<Option<User>>;

    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    async fn list_users(&self) -> RepoResult<Vec<User>>;

    async fn update_role(&self, id: Uuid, role: Role) -> RepoResult<bool>;
}

/// Repository trait for customer vehicles
#[async_trait]
pub trait VehicleRepository: Send + Sync {
    async fn create_vehicle(&self, vehicle: &Vehicle) -> RepoResult<()>;

    async fn get_vehicle(&self, id: Uuid) -> RepoResult<Option<Vehicle>>;

    async fn list_vehicles(&self, owner_id: Uuid) -> RepoResult<Vec<Vehicle>>;

    async fn update_vehicle(&self, vehicle: &Vehicle) -> RepoResult<bool>;

    async fn delete_vehicle(&self, id: Uuid) -> RepoResult<bool>;
}

/// Repository trait for flight itineraries
#[async_trait]
pub trait FlightRepository: Send + Sync {
    async fn create_flight(&self, flight: &Flight) -> RepoResult<()>;

    async fn get_flight(&self, id: Uuid) -> RepoResult<Option<Flight>>;

    async fn list_flights(&self, owner_id: Uuid) -> RepoResult<Vec<Flight>>;

    async fn update_flight(&self, flight: &Flight) -> RepoResult<bool>;

    async fn delete_flight(&self, id: Uuid) -> RepoResult<bool>;
}

/// Repository trait for the tariff catalog
#[async_trait]
pub trait TariffRepository: Send + Sync {
    async fn create_tariff(&self, tariff: &Tariff) -> RepoResult<()>;

    async fn get_tariff(&self, id: Uuid) -> RepoResult<Option<Tariff>>;

    async fn list_tariffs(&self, active_only: bool) -> RepoResult<Vec<Tariff>>;

    async fn update_tariff(&self, tariff: &Tariff) -> RepoResult<bool>;

    async fn delete_tariff(&self, id: Uuid) -> RepoResult<bool>;
}

/// Repository trait for parking-slot inventory
#[async_trait]
pub trait ParkingSlotRepository: Send + Sync {
    async fn create_slot(&self, slot: &ParkingSlot) -> RepoResult<()>;

    async fn get_slot(&self, id: Uuid) -> RepoResult<Option<ParkingSlot>>;

    /// All slots ordered by number
    async fn list_slots(&self) -> RepoResult<Vec<ParkingSlot>>;

    /// Change number and zone; status is left as stored
    async fn rename_slot(
        &self,
        id: Uuid,
        number: i32,
        zone: Option<String>,
    ) -> RepoResult<Option<ParkingSlot>>;

    async fn delete_slot(&self, id: Uuid) -> RepoResult<bool>;

    /// Atomically move the lowest-numbered available slot to Reserved and return it
    async fn reserve_first_available(&self) -> RepoResult<Option<ParkingSlot>>;

    async fn set_status(&self, id: Uuid, status: SlotStatus) -> RepoResult<Option<ParkingSlot>>;

    async fn max_number(&self) -> RepoResult<Option<i32>>;
}
