//! # tidings-core
//!
//! Shared vocabulary for the tidings gateway and delivery service.
//!
//! - **Constants**: request identifiers, response codes, session and content types, platforms
//! - **Protocol**: request/response envelopes and the typed payloads carried inside them
//! - **Codec**: the two-layer frame codec (self-describing envelope, compact payload)
//! - **Ids**: operation id and connection id generation
//! - **Logging**: `tracing` subscriber setup
//! - **Retry**: backoff math shared by the relay client and the event-log publisher
//! - **Shutdown**: cancellation-token based graceful shutdown for both listeners

#![deny(unsafe_code)]

pub mod codec;
pub mod constants;
pub mod ids;
pub mod logging;
pub mod protocol;
pub mod retry;
pub mod shutdown;

pub use codec::CodecError;
pub use protocol::{
    GetMaxAndMinSeqReq, GetMaxAndMinSeqResp, MsgData, RequestEnvelope, ResponseEnvelope,
    SendMsgReq, SendMsgResp, UserSendMsgResp,
};
