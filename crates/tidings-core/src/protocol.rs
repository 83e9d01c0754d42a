//! Wire types for the client protocol and the gateway-to-delivery relay.
//!
//! Client frames carry a [`RequestEnvelope`] whose `data` field holds a
//! second, compactly encoded payload ([`MsgData`] for send-message). The
//! gateway answers with a [`ResponseEnvelope`] whose `data` holds a
//! [`UserSendMsgResp`]. Field names on the wire follow the mobile SDKs
//! (`sendID`, `operationID`, ...), so every field is renamed explicitly.

use serde::{Deserialize, Serialize};

use crate::constants::SessionType;

/// A required field was missing or empty.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("field '{field}' {reason}")]
pub struct ValidationError {
    /// Wire name of the offending field.
    pub field: &'static str,
    /// What is wrong with it.
    pub reason: &'static str,
}

impl ValidationError {
    fn required(field: &'static str) -> Self {
        Self {
            field,
            reason: "is required",
        }
    }
}

// ── Envelopes ───────────────────────────────────────────────────────

/// Client-to-gateway frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestEnvelope {
    /// Selects the handler.
    #[serde(rename = "reqIdentifier")]
    pub req_identifier: i32,
    /// Bearer token (opaque).
    #[serde(rename = "token")]
    pub token: String,
    /// Claimed sender; must match the connection's user.
    #[serde(rename = "sendID")]
    pub send_id: String,
    /// Correlation id for logs.
    #[serde(rename = "operationID")]
    pub operation_id: String,
    /// Client-side request counter, echoed in the response.
    #[serde(rename = "msgIncr")]
    pub msg_incr: String,
    /// Identifier-specific payload, compactly encoded.
    #[serde(rename = "data", with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl RequestEnvelope {
    /// Check the fields every request must carry.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.req_identifier == 0 {
            return Err(ValidationError::required("reqIdentifier"));
        }
        if self.send_id.is_empty() {
            return Err(ValidationError::required("sendID"));
        }
        if self.operation_id.is_empty() {
            return Err(ValidationError::required("operationID"));
        }
        if self.msg_incr.is_empty() {
            return Err(ValidationError::required("msgIncr"));
        }
        Ok(())
    }
}

/// Gateway-to-client frame.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseEnvelope {
    /// Echo of the request identifier.
    #[serde(rename = "reqIdentifier")]
    pub req_identifier: i32,
    /// Echo of the request counter.
    #[serde(rename = "msgIncr")]
    pub msg_incr: String,
    /// Echo of the operation id.
    #[serde(rename = "operationID")]
    pub operation_id: String,
    /// `0` on success.
    #[serde(rename = "errCode")]
    pub err_code: i32,
    /// Error description, empty on success.
    #[serde(rename = "errMsg")]
    pub err_msg: String,
    /// Identifier-specific payload, compactly encoded.
    #[serde(rename = "data", with = "serde_bytes")]
    pub data: Vec<u8>,
}

impl ResponseEnvelope {
    /// Build a response that echoes the request's correlation fields.
    pub fn reply_to(
        request: &RequestEnvelope,
        err_code: i32,
        err_msg: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        Self {
            req_identifier: request.req_identifier,
            msg_incr: request.msg_incr.clone(),
            operation_id: request.operation_id.clone(),
            err_code,
            err_msg: err_msg.into(),
            data,
        }
    }
}

// ── Chat payloads ───────────────────────────────────────────────────

/// A chat message as submitted by a client.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MsgData {
    /// Sender user id.
    #[serde(rename = "sendID")]
    pub send_id: String,
    /// Recipient user id (single chat).
    #[serde(rename = "recvID")]
    pub recv_id: String,
    /// Group id (group chat).
    #[serde(rename = "groupID")]
    pub group_id: String,
    /// Client-assigned message id, used for dedupe.
    #[serde(rename = "clientMsgID")]
    pub client_msg_id: String,
    /// Server-assigned message id, when the client already has one.
    #[serde(rename = "serverMsgID")]
    pub server_msg_id: String,
    /// Platform the message was sent from.
    #[serde(rename = "senderPlatformID")]
    pub sender_platform_id: i32,
    /// Conversation kind tag, see [`SessionType`].
    #[serde(rename = "sessionType")]
    pub session_type: i32,
    /// User or system origin.
    #[serde(rename = "msgFrom")]
    pub msg_from: i32,
    /// Content kind, see `constants::CONTENT_*`.
    #[serde(rename = "contentType")]
    pub content_type: i32,
    /// Message body.
    #[serde(rename = "content", with = "serde_bytes")]
    pub content: Vec<u8>,
    /// Sequence number in the recipient mailbox (assigned downstream).
    #[serde(rename = "seq")]
    pub seq: u32,
    /// Server send time in milliseconds.
    #[serde(rename = "sendTime")]
    pub send_time: i64,
    /// Client creation time in milliseconds.
    #[serde(rename = "createTime")]
    pub create_time: i64,
}

impl MsgData {
    /// Schema validation for a send-message payload.
    ///
    /// Unknown session types pass; the delivery service rejects them with
    /// its own code.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.send_id.is_empty() {
            return Err(ValidationError::required("sendID"));
        }
        if self.client_msg_id.is_empty() {
            return Err(ValidationError::required("clientMsgID"));
        }
        if self.session_type == 0 {
            return Err(ValidationError::required("sessionType"));
        }
        if self.content_type == 0 {
            return Err(ValidationError::required("contentType"));
        }
        match SessionType::from_tag(self.session_type) {
            Some(SessionType::SingleChat) if self.recv_id.is_empty() => {
                Err(ValidationError::required("recvID"))
            }
            Some(SessionType::GroupChat) if self.group_id.is_empty() => {
                Err(ValidationError::required("groupID"))
            }
            _ => Ok(()),
        }
    }
}

/// Relay request from the gateway to the delivery service.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMsgReq {
    /// Bearer token of the sending connection.
    #[serde(rename = "token")]
    pub token: String,
    /// Operation id of the originating request.
    #[serde(rename = "operationID")]
    pub operation_id: String,
    /// The validated message.
    #[serde(rename = "data")]
    pub data: MsgData,
}

/// Delivery service answer to a [`SendMsgReq`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SendMsgResp {
    /// `0` on success.
    #[serde(rename = "errCode")]
    pub err_code: i32,
    /// Error description.
    #[serde(rename = "errMsg")]
    pub err_msg: String,
    /// Server message id, empty on failure.
    #[serde(rename = "serverMsgID")]
    pub server_msg_id: String,
    /// Echo of the client message id.
    #[serde(rename = "clientMsgID")]
    pub client_msg_id: String,
    /// Server send time in milliseconds, `0` on failure.
    #[serde(rename = "sendTime")]
    pub send_time: i64,
}

impl SendMsgResp {
    /// Failure response carrying only a code and message.
    pub fn failure(err_code: i32, err_msg: impl Into<String>) -> Self {
        Self {
            err_code,
            err_msg: err_msg.into(),
            ..Self::default()
        }
    }
}

/// Acknowledgement payload placed in the response envelope's `data`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserSendMsgResp {
    /// Server message id.
    #[serde(rename = "serverMsgID")]
    pub server_msg_id: String,
    /// Client message id.
    #[serde(rename = "clientMsgID")]
    pub client_msg_id: String,
    /// Server send time in milliseconds.
    #[serde(rename = "sendTime")]
    pub send_time: i64,
}

impl From<&SendMsgResp> for UserSendMsgResp {
    fn from(resp: &SendMsgResp) -> Self {
        Self {
            server_msg_id: resp.server_msg_id.clone(),
            client_msg_id: resp.client_msg_id.clone(),
            send_time: resp.send_time,
        }
    }
}

/// Mailbox sequence range query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetMaxAndMinSeqReq {
    /// Mailbox owner.
    #[serde(rename = "UserID")]
    pub user_id: String,
    /// Correlation id.
    #[serde(rename = "OperationID")]
    pub operation_id: String,
}

/// Mailbox sequence range answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GetMaxAndMinSeqResp {
    /// `0` on success.
    #[serde(rename = "ErrCode")]
    pub err_code: i32,
    /// Error description.
    #[serde(rename = "ErrMsg")]
    pub err_msg: String,
    /// Highest sequence in the mailbox.
    #[serde(rename = "MaxSeq")]
    pub max_seq: u32,
    /// Lowest sequence in the mailbox.
    #[serde(rename = "MinSeq")]
    pub min_seq: u32,
}
