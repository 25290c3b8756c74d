use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// A customer's car
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Vehicle {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub registration: String,
    pub make: String,
    pub model: String,
    pub colour: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VehicleInput {
    pub registration: String,
    pub make: String,
    pub model: String,
    pub colour: Option<String>,
}

impl VehicleInput {
    pub fn into_vehicle(self, owner_id: Uuid) -> Result<Vehicle, CoreError> {
        if self.make.trim().is_empty() || self.model.trim().is_empty() {
            return Err(CoreError::ValidationError("make and model are required".into()));
        }
        Ok(Vehicle {
            id: Uuid::new_v4(),
            owner_id,
            registration: normalize_registration(&self.registration)?,
            make: self.make.trim().to_string(),
            model: self.model.trim().to_string(),
            colour: self.colour.map(|c| c.trim().to_string()).filter(|c| !c.is_empty()),
            created_at: Utc::now(),
        })
    }

    pub fn apply_to(self, existing: &Vehicle) -> Result<Vehicle, CoreError> {
        let mut updated = self.into_vehicle(existing.owner_id)?;
        updated.id = existing.id;
        updated.created_at = existing.created_at;
        Ok(updated)
    }
}

/// Upper-case a number plate and drop spaces and hyphens
pub fn normalize_registration(raw: &str) -> Result<String, CoreError> {
    let plate: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .map(|c| c.to_ascii_uppercase())
        .collect();

    if !(2..=10).contains(&plate.len()) || !plate.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CoreError::ValidationError(format!("invalid registration: {}", raw)));
    }
    Ok(plate)
}
