use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use parklot::config::LotConfig;
use parklot::model::Vehicle;
use parklot::notify::{LoggingObserver, NotifyHub};
use parklot::observability::SPOTS_TOTAL;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("PARKLOT_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    parklot::observability::init(metrics_port)?;

    let config = match std::env::var("PARKLOT_CONFIG") {
        Ok(path) => {
            info!("loading layout from {path}");
            LotConfig::load(&path)?
        }
        Err(_) => LotConfig::demo(),
    };
    let stay_ms: u64 = std::env::var("PARKLOT_STAY_MS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    let hub = Arc::new(NotifyHub::new());
    let mut events = hub.subscribe_all();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(e) => warn!("cannot encode event: {e}"),
                },
                Err(RecvError::Lagged(n)) => warn!("event printer lagged by {n} events"),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let lot = config
        .into_builder()
        .observer(Arc::new(LoggingObserver))
        .observer(hub.clone())
        .build()?;
    metrics::gauge!(SPOTS_TOTAL).set(lot.total_spots() as f64);
    info!("lot ready");
    info!("  floors: {}", lot.floors().len());
    info!("  spots: {}", lot.total_spots());

    let arrivals = [Vehicle::car("CAR123"), Vehicle::bike("BIKE123")];
    for vehicle in arrivals.iter().cloned() {
        match lot.park(vehicle) {
            Ok(ticket) => info!("ticket {} issued for spot {}", ticket.id, ticket.spot.id()),
            Err(e) => warn!("park failed: {e}"),
        }
    }

    tokio::time::sleep(Duration::from_millis(stay_ms)).await;

    for vehicle in &arrivals {
        match lot.unpark(&vehicle.plate) {
            Ok(fee) => println!("Fee for {}: {fee:.2}", vehicle.plate),
            Err(e) => warn!("unpark failed: {e}"),
        }
    }

    // Dropping the last senders closes the channel and ends the printer.
    drop(lot);
    drop(hub);
    printer.await?;
    Ok(())
}
