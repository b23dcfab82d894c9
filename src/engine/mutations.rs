use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::fee::FeeStrategy;
use crate::limits::*;
use crate::model::*;
use crate::observability::*;

use super::{Lot, LotError};

impl Lot {
    /// Assign the nearest permitted spot, searching floors in order.
    pub fn park(&self, vehicle: Vehicle) -> Result<Ticket, LotError> {
        if vehicle.plate.len() > MAX_PLATE_LEN {
            return Err(LotError::LimitExceeded("license plate too long"));
        }
        let kind = vehicle.kind;
        let mut state = self.state.lock();

        if state.active.contains_key(&vehicle.plate) {
            metrics::counter!(PARK_TOTAL, "vehicle_type" => kind.label(), "status" => "already_parked")
                .increment(1);
            warn!(plate = %vehicle.plate, "park rejected: vehicle already parked");
            return Err(LotError::AlreadyParked(vehicle.plate));
        }

        let Some(spot) = self.claim_spot(&vehicle) else {
            metrics::counter!(PARK_TOTAL, "vehicle_type" => kind.label(), "status" => "no_capacity")
                .increment(1);
            warn!(plate = %vehicle.plate, vehicle_type = %kind, "park rejected: no capacity");
            return Err(LotError::NoCapacity(kind));
        };

        let ticket = Ticket::open(vehicle, spot, self.clock.now_ms());
        state
            .active
            .insert(ticket.vehicle.plate.clone(), ticket.clone());

        metrics::counter!(PARK_TOTAL, "vehicle_type" => kind.label(), "status" => "ok").increment(1);
        metrics::gauge!(SPOTS_OCCUPIED).set(state.active.len() as f64);
        info!(
            plate = %ticket.vehicle.plate,
            spot = ticket.spot.id(),
            floor = ticket.spot.floor(),
            ticket = %ticket.id,
            "vehicle parked"
        );

        self.notify("parked", |o| o.on_parked(&ticket.vehicle, &ticket.spot));
        Ok(ticket)
    }

    /// Release the vehicle's spot and return the fee for the stay.
    pub fn unpark(&self, plate: &str) -> Result<f64, LotError> {
        self.unpark_with_ticket(plate).map(|(_, fee)| fee)
    }

    /// Like [`Lot::unpark`], also returning the closed ticket.
    pub fn unpark_with_ticket(&self, plate: &str) -> Result<(Ticket, f64), LotError> {
        let mut state = self.state.lock();

        let Some(mut ticket) = state.active.remove(plate) else {
            metrics::counter!(UNPARK_TOTAL, "status" => "unknown_request").increment(1);
            warn!(plate, "unpark rejected: no active ticket");
            return Err(LotError::UnknownRequest(plate.to_string()));
        };

        ticket.spot.vacate();
        match self.floor_for(&ticket.spot) {
            Some(floor) => {
                if !floor.release(&ticket.spot) {
                    error!(spot = ticket.spot.id(), floor = floor.number(), "spot missing from its floor");
                }
            }
            // Unreachable for lots built through LotBuilder.
            None => error!(spot = ticket.spot.id(), floor = ticket.spot.floor(), "spot has no owning floor"),
        }
        ticket.close(self.clock.now_ms());

        metrics::counter!(UNPARK_TOTAL, "status" => "ok").increment(1);
        metrics::gauge!(SPOTS_OCCUPIED).set(state.active.len() as f64);

        self.notify("unparked", |o| o.on_unparked(&ticket.vehicle, &ticket.spot));

        let fee = Self::charge(state.fee.as_ref(), &ticket);

        let stay_ms = ticket.duration_ms().unwrap_or(0);
        metrics::histogram!(FEE_CHARGED, "vehicle_type" => ticket.vehicle.kind.label()).record(fee);
        metrics::histogram!(STAY_DURATION_SECONDS).record(stay_ms as f64 / 1000.0);
        info!(
            plate,
            spot = ticket.spot.id(),
            floor = ticket.spot.floor(),
            ticket = %ticket.id,
            stay_ms,
            fee,
            "vehicle unparked"
        );
        Ok((ticket, fee))
    }

    /// Swap the fee strategy. Applies to every unpark after this returns.
    pub fn set_fee_strategy(&self, fee: Arc<dyn FeeStrategy>) {
        self.state.lock().fee = fee;
        debug!("fee strategy replaced");
    }

    /// Run the fee strategy. A panic or a non-finite or negative result is
    /// logged and charged as 0; the ticket is already closed either way.
    fn charge(strategy: &dyn FeeStrategy, ticket: &Ticket) -> f64 {
        let plate = ticket.vehicle.plate.as_str();
        match catch_unwind(AssertUnwindSafe(|| strategy.calculate_fee(ticket))) {
            Ok(fee) if fee.is_finite() && fee >= 0.0 => fee,
            Ok(fee) => {
                warn!(plate, fee, "fee strategy returned an invalid fee; charging 0");
                0.0
            }
            Err(_) => {
                metrics::counter!(FEE_STRATEGY_PANICS_TOTAL).increment(1);
                error!(plate, "fee strategy panicked; charging 0");
                0.0
            }
        }
    }

    /// Walk floors in order; on each, take the nearest candidate and claim it.
    /// A failed claim means the candidate was taken since it was indexed, so
    /// the same floor is searched again.
    fn claim_spot(&self, vehicle: &Vehicle) -> Option<Arc<Spot>> {
        for floor in &self.floors {
            while let Some(spot) = floor.find_available(vehicle, &self.policy) {
                if spot.try_assign(vehicle) {
                    return Some(spot);
                }
                debug!(floor = floor.number(), spot = spot.id(), "claim lost, searching floor again");
            }
            debug!(floor = floor.number(), vehicle_type = %vehicle.kind, "no fitting spot on floor");
        }
        None
    }
}
