//! RPC method handlers for the delivery service.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tidings_core::protocol::{GetMaxAndMinSeqReq, SendMsgReq};
use tidings_rpc::errors::parse_params;
use tidings_rpc::methods::{GET_MAX_AND_MIN_SEQ, SEND_MESSAGE};
use tidings_rpc::{MethodHandler, MethodRegistry, RpcError};

use crate::errors::DeliveryError;
use crate::service::ChatService;

/// Shared state for every delivery handler.
pub struct DeliveryContext {
    /// The chat delivery service.
    pub chat: Arc<ChatService>,
}

/// Register all delivery methods.
pub fn register_all(registry: &mut MethodRegistry<DeliveryContext>) {
    registry.register(SEND_MESSAGE, SendMessageHandler);
    registry.register(GET_MAX_AND_MIN_SEQ, GetMaxAndMinSeqHandler);
}

/// `chat.sendMessage`
pub struct SendMessageHandler;

#[async_trait]
impl MethodHandler<DeliveryContext> for SendMessageHandler {
    async fn handle(&self, params: Option<Value>, ctx: &DeliveryContext) -> Result<Value, RpcError> {
        let request: SendMsgReq = parse_params(params)?;
        request.data.validate().map_err(|e| RpcError::InvalidParams {
            message: e.to_string(),
        })?;
        let response = ctx.chat.send_message(request).await;
        serde_json::to_value(response).map_err(|e| RpcError::Internal {
            message: e.to_string(),
        })
    }
}

/// `chat.getMaxAndMinSeq`
pub struct GetMaxAndMinSeqHandler;

#[async_trait]
impl MethodHandler<DeliveryContext> for GetMaxAndMinSeqHandler {
    async fn handle(&self, params: Option<Value>, ctx: &DeliveryContext) -> Result<Value, RpcError> {
        let request: GetMaxAndMinSeqReq = parse_params(params)?;
        match ctx.chat.get_max_and_min_seq(&request) {
            Ok(response) => serde_json::to_value(response).map_err(|e| RpcError::Internal {
                message: e.to_string(),
            }),
            Err(e @ DeliveryError::NotImplemented(_)) => Err(RpcError::NotAvailable {
                message: e.to_string(),
            }),
            Err(e) => Err(RpcError::Internal {
                message: e.to_string(),
            }),
        }
    }
}
