//! Metrics collection and exposition.
//!
//! # Metrics
//! - `httpd_requests_total` (counter): requests by status
//! - `httpd_request_duration_seconds` (histogram): dispatch latency
//! - `httpd_handler_failures_total` (counter): render errors and panics
//! - `httpd_lifecycle_transitions_total` (counter): state entered
//! - `httpd_server_running` (gauge): 1 while listening

use std::net::SocketAddr;
use std::time::Instant;

use ::metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::lifecycle::ServerState;

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}

pub fn record_request(status: u16, start: Instant) {
    counter!("httpd_requests_total", "status" => status.to_string()).increment(1);
    histogram!("httpd_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_handler_failure(kind: &'static str) {
    counter!("httpd_handler_failures_total", "kind" => kind).increment(1);
}

pub fn record_transition(to: ServerState) {
    counter!("httpd_lifecycle_transitions_total", "to" => to.as_str()).increment(1);
    gauge!("httpd_server_running").set(if to == ServerState::Running { 1.0 } else { 0.0 });
}
