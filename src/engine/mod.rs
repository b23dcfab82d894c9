mod error;
mod floor;
mod mutations;
mod policy;
mod queries;
#[cfg(test)]
mod tests;

pub use error::LotError;
pub use floor::Floor;
pub use policy::AllocationPolicy;

use std::collections::{HashMap, HashSet};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::error;

use crate::clock::{Clock, SystemClock};
use crate::config::ConfigError;
use crate::fee::{FeeStrategy, PerUnitFee};
use crate::model::*;
use crate::notify::LotObserver;

/// State guarded by the facility-wide lock.
struct LotState {
    /// plate → active ticket
    active: HashMap<String, Ticket>,
    fee: Arc<dyn FeeStrategy>,
}

/// The parking facility: floors in search order plus the active-ticket index.
///
/// Locking discipline: `park` and `unpark` hold the facility lock for their
/// whole duration, floors lock their own index, spots lock their occupant.
/// Locks are always taken in that order. Observers run while the facility lock
/// is held so they see events in commit order; they must not call back into
/// the lot.
pub struct Lot {
    floors: Vec<Floor>,
    floor_pos: HashMap<u32, usize>,
    policy: AllocationPolicy,
    observers: Vec<Arc<dyn LotObserver>>,
    clock: Arc<dyn Clock>,
    state: Mutex<LotState>,
}

impl Lot {
    pub fn builder() -> LotBuilder {
        LotBuilder::default()
    }

    pub fn policy(&self) -> &AllocationPolicy {
        &self.policy
    }

    fn floor_for(&self, spot: &Spot) -> Option<&Floor> {
        self.floor_pos.get(&spot.floor()).map(|&i| &self.floors[i])
    }

    /// Run every observer in registration order. A panicking observer is
    /// logged and skipped; the committed mutation stands.
    fn notify(&self, event: &str, f: impl Fn(&dyn LotObserver)) {
        for (i, observer) in self.observers.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| f(observer.as_ref()))).is_err() {
                metrics::counter!(crate::observability::OBSERVER_PANICS_TOTAL, "event" => event.to_string())
                    .increment(1);
                error!(observer = i, event, "observer panicked; continuing");
            }
        }
    }
}

impl std::fmt::Debug for Lot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lot")
            .field("floors", &self.floors)
            .field("observers", &self.observers.len())
            .finish()
    }
}

/// Collects the facility configuration before the first park.
pub struct LotBuilder {
    floors: Vec<Floor>,
    policy: AllocationPolicy,
    fee: Arc<dyn FeeStrategy>,
    observers: Vec<Arc<dyn LotObserver>>,
    clock: Arc<dyn Clock>,
}

impl Default for LotBuilder {
    fn default() -> Self {
        Self {
            floors: Vec::new(),
            policy: AllocationPolicy::default(),
            fee: Arc::new(PerUnitFee::hourly()),
            observers: Vec::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl LotBuilder {
    /// Floors are searched in the order they are added.
    pub fn floor(mut self, floor: Floor) -> Self {
        self.floors.push(floor);
        self
    }

    pub fn floors(mut self, floors: impl IntoIterator<Item = Floor>) -> Self {
        self.floors.extend(floors);
        self
    }

    pub fn policy(mut self, policy: AllocationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn fee_strategy(mut self, fee: Arc<dyn FeeStrategy>) -> Self {
        self.fee = fee;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn LotObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Fails if two floors share a number or two spots share an id.
    pub fn build(self) -> Result<Lot, ConfigError> {
        let mut floor_pos = HashMap::with_capacity(self.floors.len());
        {
            let mut spot_ids = HashSet::new();
            for (i, floor) in self.floors.iter().enumerate() {
                if floor_pos.insert(floor.number(), i).is_some() {
                    return Err(ConfigError::DuplicateFloor(floor.number()));
                }
                for spot in floor.spots() {
                    if !spot_ids.insert(spot.id()) {
                        return Err(ConfigError::DuplicateSpot(spot.id().to_string()));
                    }
                }
            }
        }
        Ok(Lot {
            floors: self.floors,
            floor_pos,
            policy: self.policy,
            observers: self.observers,
            clock: self.clock,
            state: Mutex::new(LotState {
                active: HashMap::new(),
                fee: self.fee,
            }),
        })
    }
}
