//! Request-identifier routing and payload validation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tidings_core::codec;
use tidings_core::constants::{ERR_DECODE, ERR_UNSUPPORTED_REQUEST, ERR_VALIDATION, WS_SEND_MSG};
use tidings_core::protocol::{MsgData, RequestEnvelope, ResponseEnvelope};
use tracing::{debug, warn};

use crate::connection::Connection;

/// Handles one request identifier.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Process `request` arriving on `conn`. `None` means no reply is sent.
    async fn handle(&self, conn: &Connection, request: &RequestEnvelope) -> Option<ResponseEnvelope>;
}

/// Typed payload produced by [`args_validate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatedPayload {
    /// Body of a send-message request.
    SendMsg(MsgData),
}

/// Payload refused by [`args_validate`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{err_msg} (code {err_code})")]
pub struct Rejection {
    /// Response code carried back to the client.
    pub err_code: i32,
    /// Human-readable reason.
    pub err_msg: String,
}

impl Rejection {
    fn new(err_code: i32, err_msg: impl Into<String>) -> Self {
        Self {
            err_code,
            err_msg: err_msg.into(),
        }
    }
}

/// Decode and validate the payload of `request` for `identifier`.
///
/// Decode failure yields code 203, a failed field check yields 204, and an
/// identifier without a payload schema yields 204 as well.
pub fn args_validate(request: &RequestEnvelope, identifier: i32) -> Result<ValidatedPayload, Rejection> {
    match identifier {
        WS_SEND_MSG => {
            let data: MsgData = codec::decode_payload(&request.data).map_err(|e| {
                warn!(operation_id = %request.operation_id, error = %e, "send payload decode failed");
                Rejection::new(ERR_DECODE, e.to_string())
            })?;
            data.validate().map_err(|e| {
                warn!(operation_id = %request.operation_id, error = %e, "send payload validation failed");
                Rejection::new(ERR_VALIDATION, e.to_string())
            })?;
            Ok(ValidatedPayload::SendMsg(data))
        }
        other => {
            warn!(identifier = other, "no payload schema for identifier");
            Err(Rejection::new(ERR_VALIDATION, "input args err"))
        }
    }
}

/// Maps request identifiers to handlers.
#[derive(Default)]
pub struct Router {
    handlers: HashMap<i32, Arc<dyn RequestHandler>>,
}

impl Router {
    /// Empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `identifier` to `handler`, replacing any previous handler.
    pub fn register(&mut self, identifier: i32, handler: impl RequestHandler + 'static) {
        let _ = self.handlers.insert(identifier, Arc::new(handler));
    }

    /// Registered identifiers, ascending.
    pub fn identifiers(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.handlers.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Run the handler for `request.req_identifier`.
    ///
    /// Unknown identifiers get an error reply with code 205.
    pub async fn dispatch(&self, conn: &Connection, request: &RequestEnvelope) -> Option<ResponseEnvelope> {
        let Some(handler) = self.handlers.get(&request.req_identifier) else {
            warn!(
                identifier = request.req_identifier,
                operation_id = %request.operation_id,
                "unsupported request identifier"
            );
            return Some(ResponseEnvelope::reply_to(
                request,
                ERR_UNSUPPORTED_REQUEST,
                format!("unsupported request identifier {}", request.req_identifier),
                Vec::new(),
            ));
        };
        debug!(identifier = request.req_identifier, operation_id = %request.operation_id, "dispatching");
        handler.handle(conn, request).await
    }
}
