//! `/health` endpoint.

use serde::Serialize;
use std::time::Instant;

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the listener is up.
    pub status: String,
    /// Seconds since the gateway started.
    pub uptime_secs: u64,
    /// Live client connections.
    pub connections: usize,
    /// Users with at least one live connection.
    pub users: usize,
}

/// Build a health response from live registry counts.
pub fn health_check(start_time: Instant, connections: usize, users: usize) -> HealthResponse {
    HealthResponse {
        status: "ok".into(),
        uptime_secs: start_time.elapsed().as_secs(),
        connections,
        users,
    }
}
