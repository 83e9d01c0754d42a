//! Group-chat delivery hook.

use async_trait::async_trait;
use tidings_core::constants::ERR_DECODE;
use tidings_core::protocol::{SendMsgReq, SendMsgResp};

/// Delivers messages whose session type is group chat.
#[async_trait]
pub trait GroupDelivery: Send + Sync {
    /// Deliver `request`; the response code reports the outcome.
    async fn deliver(&self, request: &SendMsgReq) -> SendMsgResp;
}

/// Rejects every group message.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedGroups;

#[async_trait]
impl GroupDelivery for UnsupportedGroups {
    async fn deliver(&self, _request: &SendMsgReq) -> SendMsgResp {
        SendMsgResp::failure(ERR_DECODE, "group session type not supported")
    }
}
