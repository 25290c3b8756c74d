pub mod tariff;
pub mod pricing;
pub mod inventory;

pub use tariff::{Tariff, TariffKind, TariffError, NewTariff};
pub use pricing::{PricingConfig, PricingEngine, PricingError, Quote, QuoteLine};
pub use inventory::{first_available, ParkingSlot, SlotStatus, InventoryError, OccupancySummary};
