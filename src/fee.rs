use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::model::{Ms, Ticket, VehicleType};

pub const HOUR_MS: Ms = 3_600_000;
pub const MINUTE_MS: Ms = 60_000;

/// Computes the charge for a finished stay. Implementations must return a
/// non-negative fee and round partial units up.
pub trait FeeStrategy: Send + Sync {
    fn calculate_fee(&self, ticket: &Ticket) -> f64;
}

/// Number of started units in `duration`. Zero-length stays are free.
pub fn billable_units(duration: Ms, unit: Ms) -> i64 {
    debug_assert!(unit > 0);
    if duration <= 0 {
        return 0;
    }
    (duration + unit - 1) / unit
}

/// Price per unit for each vehicle category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    pub car: f64,
    pub bike: f64,
    pub truck: f64,
}

impl RateCard {
    pub fn rate(&self, kind: VehicleType) -> f64 {
        match kind {
            VehicleType::Car => self.car,
            VehicleType::Bike => self.bike,
            VehicleType::Truck => self.truck,
        }
    }
}

/// Charges `rate * ceil(duration / unit)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PerUnitFee {
    unit_ms: Ms,
    rates: RateCard,
}

impl PerUnitFee {
    /// Fails unless `unit_ms` is positive.
    pub fn new(unit_ms: Ms, rates: RateCard) -> Result<Self, ConfigError> {
        if unit_ms <= 0 {
            return Err(ConfigError::InvalidFeeUnit(unit_ms));
        }
        Ok(Self { unit_ms, rates })
    }

    pub fn hourly() -> Self {
        Self {
            unit_ms: HOUR_MS,
            rates: RateCard {
                car: 20.0,
                bike: 10.0,
                truck: 30.0,
            },
        }
    }

    pub fn per_minute() -> Self {
        Self {
            unit_ms: MINUTE_MS,
            rates: RateCard {
                car: 0.5,
                bike: 0.2,
                truck: 1.0,
            },
        }
    }

    pub fn unit_ms(&self) -> Ms {
        self.unit_ms
    }
}

impl Default for PerUnitFee {
    fn default() -> Self {
        Self::hourly()
    }
}

impl FeeStrategy for PerUnitFee {
    fn calculate_fee(&self, ticket: &Ticket) -> f64 {
        let units = billable_units(ticket.duration_ms().unwrap_or(0), self.unit_ms);
        (units as f64 * self.rates.rate(ticket.vehicle.kind)).max(0.0)
    }
}

/// Named strategy selectable from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeSchedule {
    #[default]
    Hourly,
    PerMinute,
}

impl FeeSchedule {
    pub fn strategy(self) -> PerUnitFee {
        match self {
            FeeSchedule::Hourly => PerUnitFee::hourly(),
            FeeSchedule::PerMinute => PerUnitFee::per_minute(),
        }
    }
}
