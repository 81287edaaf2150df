//! Metrics collection and exposition.
//!
//! # Metrics
//! - `dispatch_outcomes_total` (counter): dispatches by outcome
//! - `dispatch_errors_total` (counter): failed dispatches by error kind
//! - `access_denied_total` (counter): refusals by handler
//! - `dispatch_duration_seconds` (histogram): time spent in the dispatcher
//! - `session_store_size` (gauge): sessions held by the store
//!
//! Without an installed recorder every call is a no-op.

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder with an HTTP scrape listener on `addr`.
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_dispatch_outcome(outcome: &'static str, start: Instant) {
    metrics::counter!("dispatch_outcomes_total", "outcome" => outcome).increment(1);
    metrics::histogram!("dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_dispatch_error(kind: &'static str, start: Instant) {
    metrics::counter!("dispatch_errors_total", "kind" => kind).increment(1);
    metrics::histogram!("dispatch_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_access_denied(handler: &str) {
    metrics::counter!("access_denied_total", "handler" => handler.to_string()).increment(1);
}

pub fn record_session_store_size(size: usize) {
    metrics::gauge!("session_store_size").set(size as f64);
}
