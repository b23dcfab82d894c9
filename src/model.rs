use std::fmt;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Unix milliseconds, the only time type.
pub type Ms = i64;

/// Request category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleType {
    Car,
    Bike,
    Truck,
}

impl VehicleType {
    pub const ALL: [VehicleType; 3] = [VehicleType::Car, VehicleType::Bike, VehicleType::Truck];

    pub fn label(self) -> &'static str {
        match self {
            VehicleType::Car => "car",
            VehicleType::Bike => "bike",
            VehicleType::Truck => "truck",
        }
    }
}

impl fmt::Display for VehicleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Spot capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpotType {
    Compact,
    Large,
    Bike,
}

impl SpotType {
    /// The one vehicle category this spot is built for.
    pub fn built_for(self) -> VehicleType {
        match self {
            SpotType::Compact => VehicleType::Car,
            SpotType::Large => VehicleType::Truck,
            SpotType::Bike => VehicleType::Bike,
        }
    }

    pub fn fits(self, kind: VehicleType) -> bool {
        self.built_for() == kind
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vehicle {
    pub plate: String,
    pub kind: VehicleType,
}

impl Vehicle {
    pub fn new(plate: impl Into<String>, kind: VehicleType) -> Self {
        Self {
            plate: plate.into(),
            kind,
        }
    }

    pub fn car(plate: impl Into<String>) -> Self {
        Self::new(plate, VehicleType::Car)
    }

    pub fn bike(plate: impl Into<String>) -> Self {
        Self::new(plate, VehicleType::Bike)
    }

    pub fn truck(plate: impl Into<String>) -> Self {
        Self::new(plate, VehicleType::Truck)
    }
}

/// Static description of a spot, as supplied by facility configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpotSpec {
    pub id: String,
    pub kind: SpotType,
    pub distance: u32,
}

impl SpotSpec {
    pub fn new(id: impl Into<String>, kind: SpotType, distance: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            distance,
        }
    }
}

/// A single parking spot. Location and capability are fixed; the occupant is
/// the only mutable state and doubles as the occupied flag.
pub struct Spot {
    id: String,
    kind: SpotType,
    floor: u32,
    distance: u32,
    occupant: Mutex<Option<Vehicle>>,
}

impl Spot {
    pub fn new(id: impl Into<String>, kind: SpotType, floor: u32, distance: u32) -> Self {
        Self {
            id: id.into(),
            kind,
            floor,
            distance,
            occupant: Mutex::new(None),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> SpotType {
        self.kind
    }

    pub fn floor(&self) -> u32 {
        self.floor
    }

    /// Distance from the entry gate.
    pub fn distance(&self) -> u32 {
        self.distance
    }

    pub fn can_fit(&self, vehicle: &Vehicle) -> bool {
        self.kind.fits(vehicle.kind)
    }

    pub fn is_occupied(&self) -> bool {
        self.occupant.lock().is_some()
    }

    pub fn occupant(&self) -> Option<Vehicle> {
        self.occupant.lock().clone()
    }

    /// Check-and-set claim. Returns false if the spot was already taken.
    pub(crate) fn try_assign(&self, vehicle: &Vehicle) -> bool {
        let mut slot = self.occupant.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(vehicle.clone());
        true
    }

    pub(crate) fn vacate(&self) -> Option<Vehicle> {
        self.occupant.lock().take()
    }
}

impl fmt::Debug for Spot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Spot")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("floor", &self.floor)
            .field("distance", &self.distance)
            .field("occupied", &self.is_occupied())
            .finish()
    }
}

/// Occupancy record for one stay.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub id: Ulid,
    pub vehicle: Vehicle,
    pub spot: std::sync::Arc<Spot>,
    pub entry_ms: Ms,
    pub exit_ms: Option<Ms>,
}

impl Ticket {
    pub(crate) fn open(vehicle: Vehicle, spot: std::sync::Arc<Spot>, entry_ms: Ms) -> Self {
        Self {
            id: Ulid::new(),
            vehicle,
            spot,
            entry_ms,
            exit_ms: None,
        }
    }

    /// Exit time never precedes entry, even if the clock went backwards.
    pub(crate) fn close(&mut self, now: Ms) {
        debug_assert!(self.exit_ms.is_none(), "ticket closed twice");
        self.exit_ms = Some(now.max(self.entry_ms));
    }

    pub fn is_active(&self) -> bool {
        self.exit_ms.is_none()
    }

    /// Length of the stay; `None` while the ticket is still active.
    pub fn duration_ms(&self) -> Option<Ms> {
        self.exit_ms.map(|exit| exit - self.entry_ms)
    }
}

// ── Notification payloads ────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LotEvent {
    Parked {
        plate: String,
        vehicle_type: VehicleType,
        spot_id: String,
        floor: u32,
    },
    Unparked {
        plate: String,
        vehicle_type: VehicleType,
        spot_id: String,
        floor: u32,
    },
}

impl LotEvent {
    pub fn parked(vehicle: &Vehicle, spot: &Spot) -> Self {
        LotEvent::Parked {
            plate: vehicle.plate.clone(),
            vehicle_type: vehicle.kind,
            spot_id: spot.id().to_string(),
            floor: spot.floor(),
        }
    }

    pub fn unparked(vehicle: &Vehicle, spot: &Spot) -> Self {
        LotEvent::Unparked {
            plate: vehicle.plate.clone(),
            vehicle_type: vehicle.kind,
            spot_id: spot.id().to_string(),
            floor: spot.floor(),
        }
    }

    pub fn floor(&self) -> u32 {
        match self {
            LotEvent::Parked { floor, .. } | LotEvent::Unparked { floor, .. } => *floor,
        }
    }
}

// ── Query result types ───────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FloorOccupancy {
    pub floor: u32,
    pub total: usize,
    pub occupied: usize,
}
