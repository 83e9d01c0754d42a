//! Two-layer frame codec.
//!
//! The outer envelope is MessagePack with field names (self-describing,
//! tolerant of added or missing fields). The inner payload carried in the
//! envelope's `data` bytes is MessagePack in positional form, which is
//! compact and relies on both sides agreeing on the field order.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::protocol::{RequestEnvelope, ResponseEnvelope};

/// Frame encode/decode failure.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Value could not be serialized.
    #[error("encode failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    /// Bytes could not be deserialized into the expected type.
    #[error("decode failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

/// Encode an outer envelope (named fields).
pub fn encode_envelope<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec_named(value)?)
}

/// Decode an outer envelope.
pub fn decode_envelope<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Encode an inner payload (positional fields).
pub fn encode_payload<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(rmp_serde::to_vec(value)?)
}

/// Decode an inner payload.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// Decode one client frame.
pub fn decode_request(frame: &[u8]) -> Result<RequestEnvelope, CodecError> {
    decode_envelope(frame)
}

/// Encode one gateway response frame.
pub fn encode_response(response: &ResponseEnvelope) -> Result<Vec<u8>, CodecError> {
    encode_envelope(response)
}
