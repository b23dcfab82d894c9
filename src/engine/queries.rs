use crate::model::*;

use super::{Floor, Lot};

impl Lot {
    pub fn active_ticket(&self, plate: &str) -> Option<Ticket> {
        self.state.lock().active.get(plate).cloned()
    }

    pub fn is_parked(&self, plate: &str) -> bool {
        self.state.lock().active.contains_key(plate)
    }

    pub fn active_count(&self) -> usize {
        self.state.lock().active.len()
    }

    /// All active tickets, ordered by entry time then plate.
    pub fn active_tickets(&self) -> Vec<Ticket> {
        let mut tickets: Vec<Ticket> = self.state.lock().active.values().cloned().collect();
        tickets.sort_by(|a, b| {
            a.entry_ms
                .cmp(&b.entry_ms)
                .then_with(|| a.vehicle.plate.cmp(&b.vehicle.plate))
        });
        tickets
    }

    /// Free spots across every floor that a vehicle of this category could take.
    pub fn available_spots(&self, kind: VehicleType) -> usize {
        let _state = self.state.lock();
        self.floors
            .iter()
            .map(|f| f.available_count(kind, &self.policy))
            .sum()
    }

    /// Per-floor totals, in search order. Taken under the facility lock so the
    /// counts form a consistent snapshot.
    pub fn occupancy(&self) -> Vec<FloorOccupancy> {
        let _state = self.state.lock();
        self.floors.iter().map(Floor::occupancy).collect()
    }

    pub fn floors(&self) -> &[Floor] {
        &self.floors
    }

    pub fn floor(&self, number: u32) -> Option<&Floor> {
        self.floor_pos.get(&number).map(|&i| &self.floors[i])
    }

    pub fn total_spots(&self) -> usize {
        self.floors.iter().map(|f| f.spots().len()).sum()
    }
}
