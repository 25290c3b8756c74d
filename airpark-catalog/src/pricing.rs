use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tariff::Tariff;

/// Pricing configuration, sourced from business rules
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PricingConfig {
    /// Flat fee added to every booking (in pence)
    pub booking_fee_pence: i64,

    /// Shortest stay ever charged, in days
    pub minimum_days: i64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            booking_fee_pence: 0,
            minimum_days: 1,
        }
    }
}

/// One priced line of a quote
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuoteLine {
    pub code: String,
    pub description: String,
    pub amount_pence: i64,
}

/// Result of pricing a stay against a tariff
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Quote {
    pub days: i64,
    pub lines: Vec<QuoteLine>,
    pub total_pence: i64,
}

pub struct PricingEngine {
    config: PricingConfig,
}

impl PricingEngine {
    pub fn new(config: PricingConfig) -> Self {
        Self { config }
    }

    /// Number of chargeable days between drop-off and pick-up.
    ///
    /// Counts calendar dates, so a 23:00 departure returning at 01:00 two days
    /// later is two days.
    pub fn stay_days(
        &self,
        departure_at: DateTime<Utc>,
        return_at: DateTime<Utc>,
    ) -> Result<i64, PricingError> {
        if return_at <= departure_at {
            return Err(PricingError::InvalidStay {
                departure: departure_at.to_rfc3339(),
                ret: return_at.to_rfc3339(),
            });
        }

        let days = (return_at.date_naive() - departure_at.date_naive()).num_days();
        Ok(days.max(self.config.minimum_days))
    }

    /// Price a stay. Lines are parking, optional service fee, optional booking fee.
    pub fn quote(
        &self,
        tariff: &Tariff,
        departure_at: DateTime<Utc>,
        return_at: DateTime<Utc>,
    ) -> Result<Quote, PricingError> {
        if !tariff.is_active {
            return Err(PricingError::InactiveTariff(tariff.name.clone()));
        }

        let days = self.stay_days(departure_at, return_at)?;
        let parking = tariff
            .daily_rate_pence
            .checked_mul(days)
            .ok_or(PricingError::Overflow)?;

        let mut lines = vec![QuoteLine {
            code: "PARKING".to_string(),
            description: format!("{} x {} day(s)", tariff.name, days),
            amount_pence: parking,
        }];

        if tariff.service_fee_pence > 0 {
            lines.push(QuoteLine {
                code: "SERVICE".to_string(),
                description: format!("{} service", tariff.kind.as_str()),
                amount_pence: tariff.service_fee_pence,
            });
        }

        if self.config.booking_fee_pence > 0 {
            lines.push(QuoteLine {
                code: "BOOKING_FEE".to_string(),
                description: "Booking fee".to_string(),
                amount_pence: self.config.booking_fee_pence,
            });
        }

        let mut total_pence: i64 = 0;
        for line in &lines {
            total_pence = total_pence
                .checked_add(line.amount_pence)
                .ok_or(PricingError::Overflow)?;
        }

        Ok(Quote {
            days,
            lines,
            total_pence,
        })
    }
}

impl Default for PricingEngine {
    fn default() -> Self {
        Self::new(PricingConfig::default())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("Return {ret} must be after departure {departure}")]
    InvalidStay { departure: String, ret: String },

    #[error("Tariff is not bookable: {0}")]
    InactiveTariff(String),

    #[error("Price calculation overflowed")]
    Overflow,
}
