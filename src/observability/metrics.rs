//! Metrics collection and exposition.
//!
//! # Metrics
//! - `connector_config_parses_total` (counter): source parses, cache misses only
//! - `connector_config_reloads_total` (counter): reloads by outcome
//! - `connector_config_observer_failures_total` (counter): observer errors and panics
//! - `connector_config_enabled_servers` (gauge): enabled connectors in the current snapshot

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with an HTTP listener on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_parse() {
    metrics::counter!("connector_config_parses_total").increment(1);
}

pub fn record_reload(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    metrics::counter!("connector_config_reloads_total", "outcome" => outcome).increment(1);
}

pub fn record_observer_failure() {
    metrics::counter!("connector_config_observer_failures_total").increment(1);
}

pub fn record_enabled_servers(count: usize) {
    metrics::gauge!("connector_config_enabled_servers").set(count as f64);
}
