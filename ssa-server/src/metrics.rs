//! Process-wide metrics installation: wires a single global
//! [`metrics::Recorder`] at startup rather than threading a handle
//! through every worker.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install a global Prometheus recorder and return a handle whose
/// [`PrometheusHandle::render`] produces the text-exposition scrape body.
///
/// Call once, before any worker starts recording metrics. This crate only
/// owns the connections-accepted counter; streaming-phase transitions are
/// recorded by `ssa_protocol`, and routing lookups / index rebuilds by
/// `ssa_smdb::index`, each next to the code that produces them.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .install_recorder()
        .expect("metrics recorder already installed")
}

/// Metric name recording accepted inbound connections.
pub const METRIC_CONNECTIONS_ACCEPTED: &str = "ssa_connections_accepted_total";
