//! Delivery error types.

use tidings_core::CodecError;

/// Event-log publish failure.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    /// The log could not accept the record right now.
    #[error("event log unavailable: {0}")]
    Unavailable(String),
    /// The producer does not serve this topic.
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
}

impl PublishError {
    /// Whether another attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Failure inside the chat service.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// Publishing a mailbox copy failed.
    #[error(transparent)]
    Publish(#[from] PublishError),
    /// The record could not be encoded.
    #[error("record encode failed: {0}")]
    Encode(#[from] CodecError),
    /// The operation exists on the wire but has no implementation.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}
