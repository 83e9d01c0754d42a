//! Gateway runtime configuration.

use std::time::Duration;

use tidings_core::retry::RetryConfig;
use tidings_settings::{DuplicateLoginPolicy, GatewaySettings};

/// Resolved configuration for one gateway listener.
#[derive(Clone, Debug)]
pub struct GatewayConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Upgrades beyond this many live connections are refused.
    pub max_connections: usize,
    /// Largest accepted inbound message, in bytes.
    pub max_message_size: usize,
    /// Deadline for the HTTP upgrade exchange.
    pub handshake_timeout: Duration,
    /// Deadline for a single frame write.
    pub write_timeout: Duration,
    /// What happens to the previous socket on a repeat login.
    pub duplicate_login: DuplicateLoginPolicy,
    /// Base URL of the delivery service.
    pub delivery_url: String,
    /// TCP connect deadline for delivery calls.
    pub connect_timeout: Duration,
    /// Whole-call deadline for delivery calls; `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
    /// Retry policy when the delivery service is unreachable.
    pub relay_retry: RetryConfig,
}

impl GatewayConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &GatewaySettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.ws_port,
            max_connections: settings.max_conn_num,
            max_message_size: settings.max_msg_len,
            handshake_timeout: Duration::from_secs(settings.handshake_timeout_secs),
            write_timeout: Duration::from_secs(settings.write_timeout_secs),
            duplicate_login: settings.duplicate_login,
            delivery_url: settings.delivery_url.clone(),
            connect_timeout: Duration::from_secs(settings.connect_timeout_secs),
            request_timeout: (settings.request_timeout_secs > 0)
                .then_some(Duration::from_secs(settings.request_timeout_secs)),
            relay_retry: settings.relay_retry.clone(),
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for GatewayConfig {
    /// Loopback on an ephemeral port; everything else from settings defaults.
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 0,
            ..Self::from_settings(&GatewaySettings::default())
        }
    }
}
