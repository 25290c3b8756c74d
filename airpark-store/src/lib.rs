pub mod app_config;
pub mod booking_repo;
pub mod catalog_repo;
pub mod database;
pub mod events;
pub mod fleet_repo;
pub mod flight_repo;
pub mod memory;
pub mod redis_repo;
pub mod user_repo;

pub use booking_repo::{StoreBookingRepository, StoreInvoiceRepository, StorePaymentRepository};
pub use catalog_repo::{StoreParkingSlotRepository, StoreTariffRepository};
pub use database::DbClient;
pub use events::{EventProducer, NoopPublisher};
pub use fleet_repo::StoreVehicleRepository;
pub use flight_repo::StoreFlightRepository;
pub use memory::{InMemoryStore, RecordingPublisher};
pub use redis_repo::RedisClient;
pub use user_repo::StoreUserRepository;

use std::sync::Arc;

use airpark_booking::Repositories;

/// Postgres-backed repositories sharing one pool
pub fn postgres_repositories(db: &DbClient) -> Repositories {
    Repositories {
        users: Arc::new(StoreUserRepository::new(db.pool.clone())),
        vehicles: Arc::new(StoreVehicleRepository::new(db.pool.clone())),
        flights: Arc::new(StoreFlightRepository::new(db.pool.clone())),
        tariffs: Arc::new(StoreTariffRepository::new(db.pool.clone())),
        slots: Arc::new(StoreParkingSlotRepository::new(db.pool.clone())),
        bookings: Arc::new(StoreBookingRepository::new(db.pool.clone())),
        invoices: Arc::new(StoreInvoiceRepository::new(db.pool.clone())),
        payments: Arc::new(StorePaymentRepository::new(db.pool.clone())),
    }
}

/// All repositories backed by one in-memory store
pub fn memory_repositories(store: Arc<InMemoryStore>) -> Repositories {
    Repositories {
        users: store.clone(),
        vehicles: store.clone(),
        flights: store.clone(),
        tariffs: store.clone(),
        slots: store.clone(),
        bookings: store.clone(),
        invoices: store.clone(),
        payments: store,
    }
}
