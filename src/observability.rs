use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total HTTP requests served. Labels: method, status.
pub const REQUESTS_TOTAL: &str = "innkeep_requests_total";

/// Histogram: request latency in seconds. Labels: method.
pub const REQUEST_DURATION_SECONDS: &str = "innkeep_request_duration_seconds";

/// Counter: requests rejected by the rate limiter.
pub const RATE_LIMITED_TOTAL: &str = "innkeep_rate_limited_total";

// ── Domain metrics ──────────────────────────────────────────────

/// Counter: bookings successfully created.
pub const BOOKINGS_CREATED_TOTAL: &str = "innkeep_bookings_created_total";

/// Counter: booking candidates rejected for overlapping an existing stay.
pub const BOOKING_CONFLICTS_TOTAL: &str = "innkeep_booking_conflicts_total";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
