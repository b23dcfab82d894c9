use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: park attempts. Labels: vehicle_type, status.
pub const PARK_TOTAL: &str = "parklot_park_total";

/// Counter: unpark attempts. Labels: status.
pub const UNPARK_TOTAL: &str = "parklot_unpark_total";

/// Histogram: fee charged per unpark. Labels: vehicle_type.
pub const FEE_CHARGED: &str = "parklot_fee_charged";

/// Histogram: length of completed stays in seconds.
pub const STAY_DURATION_SECONDS: &str = "parklot_stay_duration_seconds";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: spots currently held by an active ticket.
pub const SPOTS_OCCUPIED: &str = "parklot_spots_occupied";

/// Gauge: spots in the configured layout.
pub const SPOTS_TOTAL: &str = "parklot_spots_total";

/// Counter: observer callbacks that panicked. Labels: event.
pub const OBSERVER_PANICS_TOTAL: &str = "parklot_observer_panics_total";

/// Counter: fee calculations that panicked and were charged as 0.
pub const FEE_STRATEGY_PANICS_TOTAL: &str = "parklot_fee_strategy_panics_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}
