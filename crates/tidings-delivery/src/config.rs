//! Delivery service runtime configuration.

use tidings_core::retry::RetryConfig;
use tidings_settings::DeliverySettings;

/// Resolved configuration for the delivery service.
#[derive(Clone, Debug)]
pub struct DeliveryConfig {
    /// Host to bind.
    pub host: String,
    /// Port to bind (`0` picks a free port).
    pub port: u16,
    /// Event-log topic for chat records.
    pub topic: String,
    /// Partition count of the topic.
    pub partitions: u32,
    /// Retry policy for a failed publish.
    pub publish_retry: RetryConfig,
    /// Size of the dedupe window.
    pub dedupe_capacity: usize,
}

impl DeliveryConfig {
    /// Build from loaded settings.
    pub fn from_settings(settings: &DeliverySettings) -> Self {
        Self {
            host: settings.host.clone(),
            port: settings.port,
            topic: settings.topic.clone(),
            partitions: settings.partitions,
            publish_retry: settings.publish_retry.clone(),
            dedupe_capacity: settings.dedupe_capacity,
        }
    }

    /// `host:port` string for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for DeliveryConfig {
    /// Loopback on an ephemeral port; everything else from settings defaults.
    fn default() -> Self {
        Self {
            port: 0,
            ..Self::from_settings(&DeliverySettings::default())
        }
    }
}
