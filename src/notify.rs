use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::info;

use crate::model::{LotEvent, Spot, Vehicle};

const CHANNEL_CAPACITY: usize = 256;

/// Callbacks invoked by the lot after a park or unpark has been committed.
/// Called synchronously under the lot's lock: keep them short and never call
/// back into the lot.
pub trait LotObserver: Send + Sync {
    fn on_parked(&self, vehicle: &Vehicle, spot: &Spot);
    fn on_unparked(&self, vehicle: &Vehicle, spot: &Spot);
}

/// Writes one tracing event per state change.
#[derive(Debug, Default)]
pub struct LoggingObserver;

impl LotObserver for LoggingObserver {
    fn on_parked(&self, vehicle: &Vehicle, spot: &Spot) {
        info!(target: "parklot::events", plate = %vehicle.plate, spot = spot.id(), "vehicle parked at spot");
    }

    fn on_unparked(&self, vehicle: &Vehicle, spot: &Spot) {
        info!(target: "parklot::events", plate = %vehicle.plate, spot = spot.id(), "vehicle left spot");
    }
}

/// Broadcast hub: one channel per floor plus a lot-wide channel.
pub struct NotifyHub {
    all: broadcast::Sender<LotEvent>,
    floors: DashMap<u32, broadcast::Sender<LotEvent>>,
}

impl Default for NotifyHub {
    fn default() -> Self {
        Self::new()
    }
}

impl NotifyHub {
    pub fn new() -> Self {
        Self {
            all: broadcast::channel(CHANNEL_CAPACITY).0,
            floors: DashMap::new(),
        }
    }

    /// Subscribe to events for one floor. Creates the channel if needed.
    pub fn subscribe(&self, floor: u32) -> broadcast::Receiver<LotEvent> {
        let sender = self
            .floors
            .entry(floor)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0);
        sender.subscribe()
    }

    /// Subscribe to events from every floor.
    pub fn subscribe_all(&self) -> broadcast::Receiver<LotEvent> {
        self.all.subscribe()
    }

    /// Send a notification. No-op if nobody is listening.
    pub fn send(&self, event: &LotEvent) {
        let _ = self.all.send(event.clone());
        if let Some(sender) = self.floors.get(&event.floor()) {
            let _ = sender.send(event.clone());
        }
    }

    /// Drop a floor channel; existing receivers see the channel close.
    pub fn remove(&self, floor: u32) {
        self.floors.remove(&floor);
    }
}

impl LotObserver for NotifyHub {
    fn on_parked(&self, vehicle: &Vehicle, spot: &Spot) {
        self.send(&LotEvent::parked(vehicle, spot));
    }

    fn on_unparked(&self, vehicle: &Vehicle, spot: &Spot) {
        self.send(&LotEvent::unparked(vehicle, spot));
    }
}
