//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_handshakes_total` (counter): streaming handshakes by outcome
//! - `gateway_health_checks_total` (counter): plain HTTP probes answered
//! - `gateway_active_connections` (gauge): registered connections
//! - `gateway_connection_duration_seconds` (histogram): handler lifetime
//! - `gateway_reloads_total` (counter): reconfigurations by result
//! - `gateway_transport_close_errors_total` (counter): suppressed close failures
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_handshake(outcome: &'static str) {
    counter!("gateway_handshakes_total", "outcome" => outcome).increment(1);
}

pub fn record_health_check() {
    counter!("gateway_health_checks_total").increment(1);
}

pub fn record_active_connections(count: usize) {
    gauge!("gateway_active_connections").set(count as f64);
}

pub fn record_connection_closed(outcome: &'static str, started: Instant) {
    histogram!("gateway_connection_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}

pub fn record_reload(result: &'static str) {
    counter!("gateway_reloads_total", "result" => result).increment(1);
}

pub fn record_close_error() {
    counter!("gateway_transport_close_errors_total").increment(1);
}
