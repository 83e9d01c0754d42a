//! Chat delivery: stamp the message, then publish one copy per mailbox.
//!
//! The recipient copy is published first. The sender copy (for multi-device
//! sync) follows only if the recipient copy succeeded and the sender is a
//! different user. Both copies carry identical bytes.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use metrics::counter;
use serde::Serialize;
use tidings_core::codec;
use tidings_core::constants::{
    ERR_BACKEND_UNREACHABLE, ERR_DECODE, ERR_OK, ERR_PARTIAL_DELIVERY, SessionType,
};
use tidings_core::ids;
use tidings_core::protocol::{GetMaxAndMinSeqReq, GetMaxAndMinSeqResp, MsgData, SendMsgReq, SendMsgResp};
use tidings_core::retry::{RetryConfig, retry_with_backoff};
use tracing::{debug, info, instrument, warn};

use crate::dedupe::DedupeWindow;
use crate::errors::{DeliveryError, PublishError};
use crate::event_log::EventLogProducer;
use crate::group::{GroupDelivery, UnsupportedGroups};
use crate::metrics::{
    DELIVERY_DUPLICATES_TOTAL, DELIVERY_PUBLISH_ERRORS_TOTAL, DELIVERY_PUBLISH_TOTAL,
    DELIVERY_REQUESTS_TOTAL,
};

/// Running totals exposed on `/health`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DeliveryStats {
    /// Send requests handled.
    pub requests: u64,
    /// Mailbox copies published.
    pub published: u64,
    /// Mailbox copies skipped as already published.
    pub duplicates: u64,
    /// Mailbox copies that failed after retry.
    pub failures: u64,
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    published: AtomicU64,
    duplicates: AtomicU64,
    failures: AtomicU64,
}

/// Which mailbox copy is being published.
#[derive(Clone, Copy, Debug)]
enum MailboxCopy {
    Recipient,
    Sender,
}

impl MailboxCopy {
    fn label(self) -> &'static str {
        match self {
            Self::Recipient => "recipient",
            Self::Sender => "sender",
        }
    }
}

/// Publishes chat messages to per-user mailboxes.
pub struct ChatService {
    producer: Arc<dyn EventLogProducer>,
    topic: String,
    retry: RetryConfig,
    dedupe: DedupeWindow,
    groups: Arc<dyn GroupDelivery>,
    counters: Counters,
}

impl ChatService {
    /// Service publishing to `topic` through `producer`.
    pub fn new(
        producer: Arc<dyn EventLogProducer>,
        topic: impl Into<String>,
        retry: RetryConfig,
        dedupe_capacity: usize,
    ) -> Self {
        Self {
            producer,
            topic: topic.into(),
            retry,
            dedupe: DedupeWindow::new(dedupe_capacity),
            groups: Arc::new(UnsupportedGroups),
            counters: Counters::default(),
        }
    }

    /// Route group-chat sends to `groups`.
    #[must_use]
    pub fn with_group_delivery(mut self, groups: Arc<dyn GroupDelivery>) -> Self {
        self.groups = groups;
        self
    }

    /// Topic records are published to.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Snapshot of running totals.
    pub fn stats(&self) -> DeliveryStats {
        DeliveryStats {
            requests: self.counters.requests.load(Ordering::Relaxed),
            published: self.counters.published.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            failures: self.counters.failures.load(Ordering::Relaxed),
        }
    }

    /// Deliver one chat message.
    ///
    /// Codes: 0 both copies published, 201 recipient copy failed (nothing
    /// published), 202 recipient copy published but sender copy failed,
    /// 203 unsupported session type.
    #[instrument(skip_all, fields(operation_id = %request.operation_id, client_msg_id = %request.data.client_msg_id))]
    pub async fn send_message(&self, request: SendMsgReq) -> SendMsgResp {
        let _ = self.counters.requests.fetch_add(1, Ordering::Relaxed);
        let SendMsgReq {
            token,
            operation_id,
            mut data,
        } = request;

        if data.server_msg_id.is_empty() {
            data.server_msg_id.clone_from(&data.client_msg_id);
        }
        if data.send_time <= 0 {
            data.send_time = ids::now_millis();
        }

        match SessionType::from_tag(data.session_type) {
            Some(SessionType::SingleChat) => {
                counter!(DELIVERY_REQUESTS_TOTAL, "session_type" => "single").increment(1);
            }
            Some(SessionType::GroupChat) => {
                counter!(DELIVERY_REQUESTS_TOTAL, "session_type" => "group").increment(1);
                let request = SendMsgReq {
                    token,
                    operation_id,
                    data,
                };
                return self.groups.deliver(&request).await;
            }
            _ => {
                warn!(session_type = data.session_type, "unknown session type");
                return SendMsgResp::failure(ERR_DECODE, "unknown session type");
            }
        }

        let record = SendMsgReq {
            token,
            operation_id,
            data,
        };
        let value = match codec::encode_envelope(&record) {
            Ok(value) => value,
            Err(e) => {
                let e = DeliveryError::from(e);
                warn!(error = %e, "failed to encode mailbox record");
                return SendMsgResp::failure(ERR_BACKEND_UNREACHABLE, e.to_string());
            }
        };
        let data = &record.data;

        if let Err(e) = self.publish_copy(MailboxCopy::Recipient, &data.recv_id, data, &value).await {
            return SendMsgResp {
                server_msg_id: String::new(),
                send_time: 0,
                ..ack(data, ERR_BACKEND_UNREACHABLE, e.to_string())
            };
        }

        if data.send_id != data.recv_id {
            if let Err(e) = self.publish_copy(MailboxCopy::Sender, &data.send_id, data, &value).await {
                return ack(data, ERR_PARTIAL_DELIVERY, e.to_string());
            }
        }

        info!(
            send_id = %data.send_id,
            recv_id = %data.recv_id,
            server_msg_id = %data.server_msg_id,
            "message delivered"
        );
        ack(data, ERR_OK, String::new())
    }

    /// Sequence range of a mailbox. Not available in this service.
    pub fn get_max_and_min_seq(&self, request: &GetMaxAndMinSeqReq) -> Result<GetMaxAndMinSeqResp, DeliveryError> {
        debug!(user_id = %request.user_id, operation_id = %request.operation_id, "sequence range requested");
        Err(DeliveryError::NotImplemented("getMaxAndMinSeq"))
    }

    async fn publish_copy(&self, copy: MailboxCopy, key: &str, data: &MsgData, value: &[u8]) -> Result<(), DeliveryError> {
        if !self.dedupe.try_reserve(key, &data.send_id, &data.client_msg_id) {
            debug!(key, copy = copy.label(), "mailbox copy already published; skipped");
            let _ = self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            counter!(DELIVERY_DUPLICATES_TOTAL).increment(1);
            return Ok(());
        }

        let result = retry_with_backoff(&self.retry, PublishError::is_retryable, |attempt| {
            if attempt > 0 {
                debug!(key, attempt, "retrying publish");
            }
            self.producer.publish(&self.topic, key, value.to_vec())
        })
        .await;

        match result {
            Ok(position) => {
                let _ = self.counters.published.fetch_add(1, Ordering::Relaxed);
                counter!(DELIVERY_PUBLISH_TOTAL).increment(1);
                debug!(key, copy = copy.label(), partition = position.partition, offset = position.offset, "published");
                Ok(())
            }
            Err(e) => {
                self.dedupe.release(key, &data.send_id, &data.client_msg_id);
                let _ = self.counters.failures.fetch_add(1, Ordering::Relaxed);
                counter!(DELIVERY_PUBLISH_ERRORS_TOTAL, "copy" => copy.label()).increment(1);
                warn!(key, copy = copy.label(), error = %e, "publish failed");
                Err(e.into())
            }
        }
    }
}

fn ack(data: &MsgData, err_code: i32, err_msg: String) -> SendMsgResp {
    SendMsgResp {
        err_code,
        err_msg,
        server_msg_id: data.server_msg_id.clone(),
        client_msg_id: data.client_msg_id.clone(),
        send_time: data.send_time,
    }
}

/// Decode a published record body.
pub fn decode_record(value: &[u8]) -> Result<SendMsgReq, DeliveryError> {
    Ok(codec::decode_envelope(value)?)
}
