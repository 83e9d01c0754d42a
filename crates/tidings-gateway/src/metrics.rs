//! Prometheus recorder and metric names.

pub use metrics_exporter_prometheus::PrometheusHandle;
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use tracing::info;

/// Install the global Prometheus recorder.
///
/// Call once per process, before anything records. The returned handle
/// renders `/metrics`.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    info!("prometheus metrics recorder installed");
    Ok(handle)
}

/// Render Prometheus text format.
pub fn render(handle: &PrometheusHandle) -> String {
    handle.render()
}

/// Live connections (gauge).
pub const GATEWAY_CONNECTIONS_ACTIVE: &str = "gateway_connections_active";
/// Connections registered since start (counter).
pub const GATEWAY_CONNECTIONS_TOTAL: &str = "gateway_connections_total";
/// Users with at least one live connection (gauge).
pub const GATEWAY_USERS_ONLINE: &str = "gateway_users_online";
/// Upgrades refused (counter, labels: reason).
pub const GATEWAY_UPGRADES_REJECTED_TOTAL: &str = "gateway_upgrades_rejected_total";
/// Frames dispatched to a handler (counter, labels: identifier).
pub const GATEWAY_FRAMES_TOTAL: &str = "gateway_frames_total";
/// Frames dropped before dispatch (counter, labels: reason).
pub const GATEWAY_FRAMES_DROPPED_TOTAL: &str = "gateway_frames_dropped_total";
/// Delivery calls made (counter).
pub const GATEWAY_RELAY_REQUESTS_TOTAL: &str = "gateway_relay_requests_total";
/// Delivery calls failed (counter, labels: kind).
pub const GATEWAY_RELAY_ERRORS_TOTAL: &str = "gateway_relay_errors_total";
/// Delivery call latency (histogram).
pub const GATEWAY_RELAY_DURATION_SECONDS: &str = "gateway_relay_duration_seconds";
