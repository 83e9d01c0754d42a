//! Operation and connection identifiers.
//!
//! Operation ids travel with every request for log correlation. Connection
//! ids name one physical socket for the lifetime of the process and are
//! never reused: the remote address (ip and port) plus the millisecond at
//! which the upgrade completed.

use rand::Rng;

/// Current wall-clock time in milliseconds since the Unix epoch.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mint an operation id: `decimal(now_nanos + random_u32)`.
pub fn operation_id() -> String {
    let nanos = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    let jitter = i64::from(rand::rng().random::<u32>());
    nanos.saturating_add(jitter).to_string()
}

/// Build a connection id from the peer address and the current time.
pub fn connection_id(remote_addr: &str) -> String {
    connection_id_at(remote_addr, now_millis())
}

/// Build a connection id from the peer address and an explicit timestamp.
pub fn connection_id_at(remote_addr: &str, millis: i64) -> String {
    format!("{remote_addr}_{millis}")
}
