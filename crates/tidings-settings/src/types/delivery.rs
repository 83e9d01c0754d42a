//! Delivery service settings.

use serde::{Deserialize, Serialize};
use tidings_core::retry::RetryConfig;

/// Delivery service listener and event-log settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeliverySettings {
    /// Bind address of the RPC listener.
    pub host: String,
    /// RPC listener port.
    pub port: u16,
    /// Event-log topic for chat records.
    pub topic: String,
    /// Partition count of the topic.
    pub partitions: u32,
    /// Retry policy for a failed publish.
    pub publish_retry: RetryConfig,
    /// Remembered (mailbox, client message id) pairs for dedupe.
    pub dedupe_capacity: usize,
}

impl Default for DeliverySettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7749,
            topic: "ws2ms_chat".to_string(),
            partitions: 4,
            publish_retry: RetryConfig::default(),
            dedupe_capacity: 10_000,
        }
    }
}
