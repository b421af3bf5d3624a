//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): requests by route, method, status
//! - `gateway_request_duration_seconds` (histogram): latency per route
//! - `gateway_rate_limited_total` (counter): 429s per route
//! - `gateway_circuit_rejected_total` (counter): short-circuited calls per route
//! - `gateway_downstream_errors_total` (counter): failed calls by route, kind
//! - `gateway_circuit_state` (gauge): 0=closed, 1=open, 2=half-open
//!
//! Without an installed recorder every call here is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Start the Prometheus scrape endpoint. Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install Prometheus exporter"),
    }
}

pub fn record_request(route: &str, method: &str, status: u16, start: Instant) {
    metrics::counter!(
        "gateway_requests_total",
        "route" => route.to_string(),
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "route" => route.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_rate_limited(route: &str) {
    metrics::counter!("gateway_rate_limited_total", "route" => route.to_string()).increment(1);
}

pub fn record_circuit_rejected(route: &str) {
    metrics::counter!("gateway_circuit_rejected_total", "route" => route.to_string()).increment(1);
}

pub fn record_downstream_error(route: &str, kind: &'static str) {
    metrics::counter!(
        "gateway_downstream_errors_total",
        "route" => route.to_string(),
        "kind" => kind
    )
    .increment(1);
}

pub fn record_circuit_state(route: &str, state: CircuitState) {
    metrics::gauge!("gateway_circuit_state", "route" => route.to_string()).set(state.as_gauge());
}
