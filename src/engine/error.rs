use crate::model::VehicleType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LotError {
    NoCapacity(VehicleType),
    UnknownRequest(String),
    AlreadyParked(String),
    LimitExceeded(&'static str),
}

impl std::fmt::Display for LotError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LotError::NoCapacity(kind) => write!(f, "no spot available for vehicle type {kind}"),
            LotError::UnknownRequest(plate) => write!(f, "no active ticket for vehicle {plate}"),
            LotError::AlreadyParked(plate) => write!(f, "vehicle {plate} is already parked"),
            LotError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
        }
    }
}

impl std::error::Error for LotError {}
