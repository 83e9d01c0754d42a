//! Gateway listener, connection, and relay settings.

use serde::{Deserialize, Serialize};
use tidings_core::retry::RetryConfig;

/// What happens to the existing connection when the same user logs in
/// again on the same platform.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicateLoginPolicy {
    /// The new connection takes the (user, platform) slot; the old socket
    /// stays open until its own read loop ends.
    #[default]
    Replace,
    /// The new connection takes the slot and the old socket is closed.
    Kick,
}

/// Client-facing gateway settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GatewaySettings {
    /// Bind address.
    pub host: String,
    /// WebSocket listener port.
    pub ws_port: u16,
    /// Upgrades are refused once this many connections are live.
    pub max_conn_num: usize,
    /// Largest accepted frame in bytes.
    pub max_msg_len: usize,
    /// Deadline for the upgrade handshake in seconds.
    pub handshake_timeout_secs: u64,
    /// Deadline for each frame write in seconds.
    pub write_timeout_secs: u64,
    /// Base URL of the delivery service RPC endpoint.
    pub delivery_url: String,
    /// Dial timeout for the delivery service in seconds.
    pub connect_timeout_secs: u64,
    /// Whole-request deadline for a relayed call in seconds; 0 waits
    /// for as long as the delivery service takes.
    pub request_timeout_secs: u64,
    /// Duplicate login handling.
    pub duplicate_login: DuplicateLoginPolicy,
    /// Retry policy for an unreachable delivery service.
    pub relay_retry: RetryConfig,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            ws_port: 7777,
            max_conn_num: 10_000,
            max_msg_len: 4096,
            handshake_timeout_secs: 10,
            write_timeout_secs: 60,
            delivery_url: "http://127.0.0.1:7749".to_string(),
            connect_timeout_secs: 5,
            request_timeout_secs: 0,
            duplicate_login: DuplicateLoginPolicy::Replace,
            relay_retry: RetryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = GatewaySettings::default();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.max_conn_num, 10_000);
        assert_eq!(cfg.max_msg_len, 4096);
        assert_eq!(cfg.handshake_timeout_secs, 10);
        assert_eq!(cfg.request_timeout_secs, 0);
        assert_eq!(cfg.relay_retry.max_retries, 2);
    }

    #[test]
    fn policy_wire_names() {
        assert_eq!(
            serde_json::to_value(DuplicateLoginPolicy::Kick).unwrap(),
            "kick"
        );
        let p: DuplicateLoginPolicy = serde_json::from_str("\"replace\"").unwrap();
        assert_eq!(p, DuplicateLoginPolicy::Replace);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: GatewaySettings =
            serde_json::from_str(r#"{"wsPort": 9000, "duplicateLogin": "kick"}"#).unwrap();
        assert_eq!(cfg.ws_port, 9000);
        assert_eq!(cfg.duplicate_login, DuplicateLoginPolicy::Kick);
        assert_eq!(cfg.write_timeout_secs, 60);
    }
}
