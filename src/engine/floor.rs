use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::model::*;

use super::AllocationPolicy;

/// Min-heap key: (distance from gate, position in the floor's spot list).
type SlotKey = Reverse<(u32, usize)>;

struct AvailabilityIndex {
    heap: BinaryHeap<SlotKey>,
    /// `indexed[slot]` is true while the slot has an entry in `heap`.
    indexed: Vec<bool>,
}

/// A floor of spots with its own nearest-first availability index.
///
/// The index only holds candidates; a spot's occupant is authoritative. Spots
/// found occupied during a scan are dropped from the index and come back when
/// they are released.
pub struct Floor {
    number: u32,
    spots: Vec<Arc<Spot>>,
    by_id: HashMap<String, usize>,
    index: Mutex<AvailabilityIndex>,
}

impl Floor {
    pub fn new(number: u32, specs: impl IntoIterator<Item = SpotSpec>) -> Self {
        let spots: Vec<Arc<Spot>> = specs
            .into_iter()
            .map(|s| Arc::new(Spot::new(s.id, s.kind, number, s.distance)))
            .collect();
        let by_id = spots
            .iter()
            .enumerate()
            .map(|(slot, s)| (s.id().to_string(), slot))
            .collect();
        let heap = spots
            .iter()
            .enumerate()
            .map(|(slot, s)| Reverse((s.distance(), slot)))
            .collect();
        let indexed = vec![true; spots.len()];
        Self {
            number,
            spots,
            by_id,
            index: Mutex::new(AvailabilityIndex { heap, indexed }),
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn spots(&self) -> &[Arc<Spot>] {
        &self.spots
    }

    pub fn spot(&self, id: &str) -> Option<&Arc<Spot>> {
        self.by_id.get(id).map(|&slot| &self.spots[slot])
    }

    /// Nearest free spot that the policy permits and the vehicle fits in.
    /// The returned spot is taken out of the index; the caller must either
    /// claim it or hand it back through [`Floor::release`].
    pub fn find_available(&self, vehicle: &Vehicle, policy: &AllocationPolicy) -> Option<Arc<Spot>> {
        let mut index = self.index.lock();
        let mut rejected = Vec::new();
        let mut found = None;

        while let Some(Reverse((distance, slot))) = index.heap.pop() {
            let spot = &self.spots[slot];
            if spot.is_occupied() {
                debug!(floor = self.number, spot = spot.id(), "dropping occupied spot from index");
                index.indexed[slot] = false;
                continue;
            }
            if policy.permits(vehicle.kind, spot.kind()) && spot.can_fit(vehicle) {
                index.indexed[slot] = false;
                found = Some(spot.clone());
                break;
            }
            rejected.push(Reverse((distance, slot)));
        }

        index.heap.extend(rejected);
        found
    }

    /// Put a spot back into the availability index. Returns false if the spot
    /// does not belong to this floor.
    pub fn release(&self, spot: &Spot) -> bool {
        let Some(&slot) = self.by_id.get(spot.id()) else {
            return false;
        };
        let mut index = self.index.lock();
        if !index.indexed[slot] {
            index.indexed[slot] = true;
            index.heap.push(Reverse((self.spots[slot].distance(), slot)));
        }
        true
    }

    /// Free spots a vehicle of this category could be assigned to.
    pub fn available_count(&self, kind: VehicleType, policy: &AllocationPolicy) -> usize {
        self.spots
            .iter()
            .filter(|s| !s.is_occupied() && policy.permits(kind, s.kind()) && s.kind().fits(kind))
            .count()
    }

    pub fn occupied_count(&self) -> usize {
        self.spots.iter().filter(|s| s.is_occupied()).count()
    }

    pub fn occupancy(&self) -> FloorOccupancy {
        FloorOccupancy {
            floor: self.number,
            total: self.spots.len(),
            occupied: self.occupied_count(),
        }
    }

    #[cfg(test)]
    pub(super) fn indexed_len(&self) -> usize {
        self.index.lock().heap.len()
    }
}

impl std::fmt::Debug for Floor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Floor")
            .field("number", &self.number)
            .field("spots", &self.spots.len())
            .finish()
    }
}
