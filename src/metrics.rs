//! Prometheus metrics for gate decisions and secret rotation.
//!
//! Metrics are exposed via a dedicated HTTP listener when `METRICS_PORT` is
//! non-zero. Recording functions are no-ops until a recorder is installed,
//! so they are safe to call from tests.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `gatekeeper_decisions_total` - Gate decisions (labels: gate, outcome)
//! - `gatekeeper_secret_refresh_total` - Refresh attempts (label: result)
//!
//! ## Gauges
//! - `gatekeeper_secret_source` - 1 for the source of the published secret, 0 otherwise (label: source)

use std::net::SocketAddr;

use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::{error, info};

use crate::gate::GateOutcome;
use crate::secrets::SecretSourceKind;

/// Metric names as constants for consistency.
pub mod names {
    pub const DECISIONS_TOTAL: &str = "gatekeeper_decisions_total";
    pub const SECRET_REFRESH_TOTAL: &str = "gatekeeper_secret_refresh_total";
    pub const SECRET_SOURCE: &str = "gatekeeper_secret_source";
}

const ALL_SOURCES: [SecretSourceKind; 3] = [
    SecretSourceKind::Vault,
    SecretSourceKind::EnvironmentFallback,
    SecretSourceKind::StaticDefault,
];

/// Install the Prometheus exporter and describe all metrics.
///
/// # Errors
///
/// Returns a message if the exporter cannot be installed (e.g. port in use).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(
        names::DECISIONS_TOTAL,
        "Gate decisions by gate and outcome"
    );
    describe_counter!(
        names::SECRET_REFRESH_TOTAL,
        "Secret refresh attempts by result"
    );
    describe_gauge!(
        names::SECRET_SOURCE,
        "Source of the currently published secret (1 = active)"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Initialize metrics, logging instead of failing.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

pub fn record_gate_decision(gate: &'static str, outcome: GateOutcome) {
    let outcome = match outcome {
        GateOutcome::Allow => "allow",
        GateOutcome::Deny => "deny",
    };
    counter!(names::DECISIONS_TOTAL, "gate" => gate, "outcome" => outcome).increment(1);
}

/// Record a refresh attempt; `result` is `success` or an error kind.
pub fn record_secret_refresh(result: &'static str) {
    counter!(names::SECRET_REFRESH_TOTAL, "result" => result).increment(1);
}

pub fn set_secret_source(active: SecretSourceKind) {
    for source in ALL_SOURCES {
        let value = if source == active { 1.0 } else { 0.0 };
        gauge!(names::SECRET_SOURCE, "source" => source.as_str()).set(value);
    }
}
