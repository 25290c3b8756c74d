use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::CoreError;

/// Outbound and return flights the parking stay is built around
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Flight {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub outbound_flight_number: String,
    pub departure_at: DateTime<Utc>,
    pub return_flight_number: String,
    pub return_at: DateTime<Utc>,
    pub destination: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FlightInput {
    pub outbound_flight_number: String,
    pub departure_at: DateTime<Utc>,
    pub return_flight_number: String,
    pub return_at: DateTime<Utc>,
    pub destination: String,
}

impl FlightInput {
    pub fn into_flight(self, owner_id: Uuid) -> Result<Flight, CoreError> {
        if self.return_at <= self.departure_at {
            return Err(CoreError::ValidationError(
                "return flight must land after the outbound departure".into(),
            ));
        }
        if self.destination.trim().is_empty() {
            return Err(CoreError::ValidationError("destination is required".into()));
        }

        Ok(Flight {
            id: Uuid::new_v4(),
            owner_id,
            outbound_flight_number: normalize_flight_number(&self.outbound_flight_number)?,
            departure_at: self.departure_at,
            return_flight_number: normalize_flight_number(&self.return_flight_number)?,
            return_at: self.return_at,
            destination: self.destination.trim().to_string(),
            created_at: Utc::now(),
        })
    }

    pub fn apply_to(self, existing: &Flight) -> Result<Flight, CoreError> {
        let mut updated = self.into_flight(existing.owner_id)?;
        updated.id = existing.id;
        updated.created_at = existing.created_at;
        Ok(updated)
    }
}

/// `BA2490`, `u2 8012`, `EZ12A`: two-character designator, 1-4 digits, optional suffix
pub fn normalize_flight_number(raw: &str) -> Result<String, CoreError> {
    let code: String = raw
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_ascii_uppercase())
        .collect();

    let invalid = || CoreError::ValidationError(format!("invalid flight number: {}", raw));

    if code.len() < 3 || !code.is_ascii() {
        return Err(invalid());
    }
    let (designator, rest) = code.split_at(2);
    if !designator.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(invalid());
    }

    let rest = rest.strip_suffix(|c: char| c.is_ascii_alphabetic()).unwrap_or(rest);
    if rest.is_empty() || rest.len() > 4 || !rest.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_flight_numbers() {
        assert_eq!(normalize_flight_number("ba2490").unwrap(), "BA2490");
        assert_eq!(normalize_flight_number("U2 8012").unwrap(), "U28012");
        assert_eq!(normalize_flight_number("EZ12A").unwrap(), "EZ12A");
        assert!(normalize_flight_number("BA").is_err());
        assert!(normalize_flight_number("BA12345").is_err());
        assert!(normalize_flight_number("B!123").is_err());
    }

    #[test]
    fn test_return_must_follow_departure() {
        let now = Utc::now();
        let input = FlightInput {
            outbound_flight_number: "BA100".to_string(),
            departure_at: now,
            return_flight_number: "BA101".to_string(),
            return_at: now - Duration::hours(1),
            destination: "Lisbon".to_string(),
        };
        assert!(input.into_flight(Uuid::new_v4()).is_err());
    }
}
