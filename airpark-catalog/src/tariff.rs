use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Service categories a customer can book
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TariffKind {
    ParkingSlot,
    MiniValet,
    FullValet,
}

impl TariffKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TariffKind::ParkingSlot => "PARKING_SLOT",
            TariffKind::MiniValet => "MINI_VALET",
            TariffKind::FullValet => "FULL_VALET",
        }
    }

    pub fn is_valet(&self) -> bool {
        matches!(self, TariffKind::MiniValet | TariffKind::FullValet)
    }
}

impl std::str::FromStr for TariffKind {
    type Err = TariffError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PARKING_SLOT" => Ok(TariffKind::ParkingSlot),
            "MINI_VALET" => Ok(TariffKind::MiniValet),
            "FULL_VALET" => Ok(TariffKind::FullValet),
            other => Err(TariffError::UnknownKind(other.to_string())),
        }
    }
}

/// A priced service category.
///
/// Every tariff charges `daily_rate_pence` per day of stay; valet tariffs add
/// a flat `service_fee_pence` on top.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tariff {
    pub id: Uuid,
    pub kind: TariffKind,
    pub name: String,
    pub description: Option<String>,
    pub daily_rate_pence: i64,
    pub service_fee_pence: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Admin input for creating or replacing a tariff
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTariff {
    pub kind: TariffKind,
    pub name: String,
    pub description: Option<String>,
    pub daily_rate_pence: i64,
    #[serde(default)]
    pub service_fee_pence: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl NewTariff {
    pub fn validate(&self) -> Result<(), TariffError> {
        if self.name.trim().is_empty() {
            return Err(TariffError::Invalid("tariff name is required".into()));
        }
        if self.daily_rate_pence < 0 || self.service_fee_pence < 0 {
            return Err(TariffError::Invalid("amounts cannot be negative".into()));
        }
        if self.kind.is_valet() && self.service_fee_pence == 0 {
            return Err(TariffError::Invalid(format!(
                "{} tariffs must carry a service fee",
                self.kind.as_str()
            )));
        }
        Ok(())
    }

    pub fn into_tariff(self) -> Result<Tariff, TariffError> {
        self.validate()?;
        Ok(Tariff {
            id: Uuid::new_v4(),
            kind: self.kind,
            name: self.name.trim().to_string(),
            description: self.description,
            daily_rate_pence: self.daily_rate_pence,
            service_fee_pence: self.service_fee_pence,
            is_active: self.is_active,
            created_at: Utc::now(),
        })
    }

    /// Apply this input over an existing tariff, keeping its id and creation time
    pub fn apply_to(self, existing: &Tariff) -> Result<Tariff, TariffError> {
        let mut updated = self.into_tariff()?;
        updated.id = existing.id;
        updated.created_at = existing.created_at;
        Ok(updated)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TariffError {
    #[error("Invalid tariff: {0}")]
    Invalid(String),

    #[error("Unknown tariff kind: {0}")]
    UnknownKind(String),
}
