use airpark_shared::models::events::SlotStatusChangedEvent;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Parking slot status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Available,
    Reserved,
    Occupied,
}

impl SlotStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotStatus::Available => "AVAILABLE",
            SlotStatus::Reserved => "RESERVED",
            SlotStatus::Occupied => "OCCUPIED",
        }
    }
}

impl std::str::FromStr for SlotStatus {
    type Err = InventoryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SlotStatus::Available),
            "RESERVED" => Ok(SlotStatus::Reserved),
            "OCCUPIED" => Ok(SlotStatus::Occupied),
            other => Err(InventoryError::UnknownStatus(other.to_string())),
        }
    }
}

/// A numbered bay in the car park
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParkingSlot {
    pub id: Uuid,
    pub number: i32,
    pub zone: Option<String>,
    pub status: SlotStatus,
    pub updated_at: DateTime<Utc>,
}

impl ParkingSlot {
    pub fn new(number: i32, zone: Option<String>) -> Result<Self, InventoryError> {
        if number <= 0 {
            return Err(InventoryError::InvalidNumber(number));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            number,
            zone,
            status: SlotStatus::Available,
            updated_at: Utc::now(),
        })
    }

    /// Available → Reserved (booking made)
    pub fn reserve(&mut self) -> Result<(), InventoryError> {
        self.transition(&[SlotStatus::Available], SlotStatus::Reserved)
    }

    /// Reserved → Occupied (vehicle dropped off)
    pub fn occupy(&mut self) -> Result<(), InventoryError> {
        self.transition(&[SlotStatus::Reserved], SlotStatus::Occupied)
    }

    /// Reserved | Occupied → Available (cancelled, expired or collected)
    pub fn release(&mut self) -> Result<(), InventoryError> {
        self.transition(&[SlotStatus::Reserved, SlotStatus::Occupied], SlotStatus::Available)
    }

    fn transition(
        &mut self,
        allowed_from: &[SlotStatus],
        to: SlotStatus,
    ) -> Result<(), InventoryError> {
        if !allowed_from.contains(&self.status) {
            return Err(InventoryError::InvalidTransition {
                number: self.number,
                from: self.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn status_event(&self) -> SlotStatusChangedEvent {
        SlotStatusChangedEvent {
            parking_slot_id: self.id,
            number: self.number,
            status: self.status.as_str().to_string(),
            timestamp: self.updated_at.timestamp(),
        }
    }
}

/// Lowest-numbered available slot, by linear scan
pub fn first_available(slots: &[ParkingSlot]) -> Option<&ParkingSlot> {
    slots
        .iter()
        .filter(|slot| slot.status == SlotStatus::Available)
        .min_by_key(|slot| slot.number)
}

/// Counts per status across the car park
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct OccupancySummary {
    pub total: usize,
    pub available: usize,
    pub reserved: usize,
    pub occupied: usize,
}

impl OccupancySummary {
    pub fn from_slots(slots: &[ParkingSlot]) -> Self {
        let mut summary = Self {
            total: slots.len(),
            ..Self::default()
        };
        for slot in slots {
            match slot.status {
                SlotStatus::Available => summary.available += 1,
                SlotStatus::Reserved => summary.reserved += 1,
                SlotStatus::Occupied => summary.occupied += 1,
            }
        }
        summary
    }

    /// Share of slots not available, 0.0 for an empty car park
    pub fn utilisation(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            1.0 - (self.available as f64 / self.total as f64)
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Slot number must be positive, got {0}")]
    InvalidNumber(i32),

    #[error("Slot {number} cannot move from {from} to {to}")]
    InvalidTransition { number: i32, from: String, to: String },

    #[error("Unknown slot status: {0}")]
    UnknownStatus(String),
}
