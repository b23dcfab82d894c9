use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::engine::{AllocationPolicy, Floor, LotBuilder};
use crate::fee::FeeSchedule;
use crate::limits::*;
use crate::model::*;

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    DuplicateFloor(u32),
    DuplicateSpot(String),
    EmptyId,
    LimitExceeded(&'static str),
    InvalidFeeUnit(Ms),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config: {e}"),
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
            ConfigError::DuplicateFloor(n) => write!(f, "duplicate floor number: {n}"),
            ConfigError::DuplicateSpot(id) => write!(f, "duplicate spot id: {id}"),
            ConfigError::EmptyId => write!(f, "spot id must not be empty"),
            ConfigError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            ConfigError::InvalidFeeUnit(ms) => write!(f, "fee unit must be positive, got {ms}ms"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io(e) => Some(e),
            ConfigError::Parse(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self {
        ConfigError::Parse(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorConfig {
    pub number: u32,
    pub spots: Vec<SpotSpec>,
}

/// Facility layout as read from JSON.
///
/// ```json
/// {
///   "floors": [
///     { "number": 1, "spots": [ { "id": "F1-C1", "kind": "compact", "distance": 2 } ] }
///   ],
///   "policy": { "car": ["compact", "large"] },
///   "fee": "per_minute"
/// }
/// ```
///
/// `policy` replaces the default compatibility map when present; `fee`
/// defaults to hourly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LotConfig {
    pub floors: Vec<FloorConfig>,
    #[serde(default)]
    pub policy: Option<HashMap<VehicleType, Vec<SpotType>>>,
    #[serde(default)]
    pub fee: FeeSchedule,
}

impl LotConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: LotConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// One floor with a bike, a compact and a large spot.
    pub fn demo() -> Self {
        Self {
            floors: vec![FloorConfig {
                number: 1,
                spots: vec![
                    SpotSpec::new("F1-B1", SpotType::Bike, 1),
                    SpotSpec::new("F1-C1", SpotType::Compact, 2),
                    SpotSpec::new("F1-L1", SpotType::Large, 3),
                ],
            }],
            policy: None,
            fee: FeeSchedule::Hourly,
        }
    }

    /// Bounds and id checks. Uniqueness is checked again by [`LotBuilder::build`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.floors.len() > MAX_FLOORS {
            return Err(ConfigError::LimitExceeded("too many floors"));
        }
        for floor in &self.floors {
            if floor.spots.len() > MAX_SPOTS_PER_FLOOR {
                return Err(ConfigError::LimitExceeded("too many spots on floor"));
            }
            for spot in &floor.spots {
                if spot.id.is_empty() {
                    return Err(ConfigError::EmptyId);
                }
                if spot.id.len() > MAX_SPOT_ID_LEN {
                    return Err(ConfigError::LimitExceeded("spot id too long"));
                }
            }
        }
        Ok(())
    }

    pub fn policy(&self) -> AllocationPolicy {
        match &self.policy {
            Some(map) => AllocationPolicy::new(map.clone()),
            None => AllocationPolicy::default(),
        }
    }

    /// Builder preloaded with floors, policy and fee strategy. Observers and
    /// the clock are left to the caller.
    pub fn into_builder(self) -> LotBuilder {
        let policy = self.policy();
        let fee = Arc::new(self.fee.strategy());
        LotBuilder::default()
            .floors(
                self.floors
                    .into_iter()
                    .map(|f| Floor::new(f.number, f.spots)),
            )
            .policy(policy)
            .fee_strategy(fee)
    }
}
