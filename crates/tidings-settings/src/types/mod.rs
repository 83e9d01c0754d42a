//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase", default)]` so a settings
//! file may name only the fields it changes.

mod delivery;
mod gateway;

pub use delivery::*;
pub use gateway::*;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Root settings for both processes.
///
/// ```json
/// {
///   "gateway": { "wsPort": 9000, "duplicateLogin": "kick" },
///   "delivery": { "partitions": 8 }
/// }
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TidingsSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Gateway (client-facing) settings.
    pub gateway: GatewaySettings,
    /// Delivery service settings.
    pub delivery: DeliverySettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for TidingsSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "tidings".to_string(),
            gateway: GatewaySettings::default(),
            delivery: DeliverySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl TidingsSettings {
    /// Reject values the processes cannot run with.
    pub fn validate(&self) -> Result<()> {
        let g = &self.gateway;
        if g.max_conn_num == 0 {
            return Err(SettingsError::invalid("gateway.maxConnNum", "must be at least 1"));
        }
        if g.max_msg_len == 0 {
            return Err(SettingsError::invalid("gateway.maxMsgLen", "must be at least 1"));
        }
        if g.write_timeout_secs == 0 {
            return Err(SettingsError::invalid("gateway.writeTimeoutSecs", "must be at least 1"));
        }
        if !(g.delivery_url.starts_with("http://") || g.delivery_url.starts_with("https://")) {
            return Err(SettingsError::invalid(
                "gateway.deliveryUrl",
                format!("must be an http(s) URL, got '{}'", g.delivery_url),
            ));
        }
        let d = &self.delivery;
        if d.topic.is_empty() {
            return Err(SettingsError::invalid("delivery.topic", "must not be empty"));
        }
        if d.partitions == 0 {
            return Err(SettingsError::invalid("delivery.partitions", "must be at least 1"));
        }
        Ok(())
    }
}

/// Logging settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default filter when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}
