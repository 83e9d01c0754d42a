//! End-to-end tests: a real gateway relaying to a real delivery service
//! backed by the in-memory event log.

#![allow(missing_docs, unused_results)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tidings_core::codec::{decode_envelope, decode_payload, encode_envelope, encode_payload};
use tidings_core::constants::{
    ERR_BACKEND_UNREACHABLE, ERR_OK, ERR_UNSUPPORTED_REQUEST, ERR_VALIDATION, SessionType, WS_HEARTBEAT, WS_SEND_MSG,
};
use tidings_core::protocol::{MsgData, RequestEnvelope, ResponseEnvelope, UserSendMsgResp};
use tidings_core::retry::RetryConfig;
use tidings_delivery::service::decode_record;
use tidings_delivery::{ChatService, DeliveryConfig, DeliveryServer, MemoryEventLog};
use tidings_gateway::relay::HttpDeliveryClient;
use tidings_gateway::{GatewayConfig, GatewayServer, default_router};
use tidings_settings::DuplicateLoginPolicy;
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

const TIMEOUT: Duration = Duration::from_secs(5);

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

struct Stack {
    gateway: GatewayServer,
    gateway_addr: SocketAddr,
    delivery: DeliveryServer,
    delivery_task: Option<JoinHandle<()>>,
    log: Arc<MemoryEventLog>,
}

impl Stack {
    async fn start(tweak: impl FnOnce(&mut GatewayConfig)) -> Self {
        let delivery_config = DeliveryConfig::default();
        let log = Arc::new(MemoryEventLog::new(
            &delivery_config.topic,
            delivery_config.partitions,
        ));
        let chat = ChatService::new(
            log.clone(),
            delivery_config.topic.clone(),
            RetryConfig::none(),
            1024,
        );
        let delivery = DeliveryServer::new(delivery_config, Arc::new(chat));
        let (delivery_addr, delivery_task) = delivery.listen().await.unwrap();

        let mut config = GatewayConfig {
            delivery_url: format!("http://{delivery_addr}"),
            relay_retry: RetryConfig::none(),
            ..GatewayConfig::default()
        };
        tweak(&mut config);

        let client = HttpDeliveryClient::new(
            &config.delivery_url,
            config.connect_timeout,
            config.request_timeout,
            RetryConfig::none(),
        )
        .unwrap();
        let gateway = GatewayServer::new(config, default_router(Arc::new(client)));
        let (gateway_addr, _) = gateway.listen().await.unwrap();

        Self {
            gateway,
            gateway_addr,
            delivery,
            delivery_task: Some(delivery_task),
            log,
        }
    }

    fn url(&self, query: &str) -> String {
        format!("ws://{}/?{query}", self.gateway_addr)
    }

    async fn connect(&self, user: &str, platform: i32) -> Client {
        let url = self.url(&format!("token=t-{user}&userID={user}&platformID={platform}"));
        let (ws, _) = tokio::time::timeout(TIMEOUT, connect_async(url))
            .await
            .unwrap()
            .unwrap();
        ws
    }

    async fn wait_for_connections(&self, expected: usize) {
        tokio::time::timeout(TIMEOUT, async {
            while self.gateway.registry().connection_count() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    fn stop(&self) {
        self.gateway.shutdown().shutdown();
        self.delivery.shutdown().shutdown();
    }
}

fn send_msg_frame(send: &str, recv: &str, client_msg_id: &str, incr: &str) -> Vec<u8> {
    let data = MsgData {
        send_id: send.into(),
        recv_id: recv.into(),
        client_msg_id: client_msg_id.into(),
        sender_platform_id: 1,
        session_type: SessionType::SingleChat.tag(),
        content_type: 101,
        content: b"hello".to_vec(),
        ..MsgData::default()
    };
    let request = RequestEnvelope {
        req_identifier: WS_SEND_MSG,
        token: format!("t-{send}"),
        send_id: send.into(),
        operation_id: format!("op-{incr}"),
        msg_incr: incr.into(),
        data: encode_payload(&data).unwrap(),
    };
    encode_envelope(&request).unwrap()
}

fn bare_frame(identifier: i32, send: &str, incr: &str) -> Vec<u8> {
    let request = RequestEnvelope {
        req_identifier: identifier,
        send_id: send.into(),
        operation_id: format!("op-{incr}"),
        msg_incr: incr.into(),
        ..RequestEnvelope::default()
    };
    encode_envelope(&request).unwrap()
}

async fn send_binary(ws: &mut Client, frame: Vec<u8>) {
    ws.send(Message::Binary(frame.into())).await.unwrap();
}

async fn next_response(ws: &mut Client) -> ResponseEnvelope {
    loop {
        let msg = tokio::time::timeout(TIMEOUT, ws.next())
            .await
            .unwrap()
            .expect("stream ended")
            .unwrap();
        if let Message::Binary(bytes) = msg {
            return decode_envelope(&bytes[..]).unwrap();
        }
    }
}

async fn expect_closed(ws: &mut Client) {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match ws.next().await {
                None | Some(Err(_) | Ok(Message::Close(_))) => break,
                Some(Ok(_)) => {}
            }
        }
    })
    .await
    .unwrap();
}

async fn rejected_status(url: String) -> u16 {
    match tokio::time::timeout(TIMEOUT, connect_async(url)).await.unwrap() {
        Err(tungstenite::Error::Http(resp)) => resp.status().as_u16(),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("upgrade unexpectedly accepted"),
    }
}

// ── Tests ──

#[tokio::test]
async fn upgrade_without_platform_is_rejected() {
    let stack = Stack::start(|_| {}).await;
    let status = rejected_status(stack.url("token=t&userID=u1")).await;
    assert_eq!(status, 400);
    assert_eq!(stack.gateway.registry().connection_count(), 0);
    stack.stop();
}

#[tokio::test]
async fn upgrade_beyond_capacity_is_refused() {
    let stack = Stack::start(|c| c.max_connections = 1).await;
    let _first = stack.connect("u1", 1).await;
    stack.wait_for_connections(1).await;

    let status = rejected_status(stack.url("token=t&userID=u2&platformID=1")).await;
    assert_eq!(status, 503);
    stack.stop();
}

#[tokio::test]
async fn send_message_reaches_both_mailboxes() {
    let stack = Stack::start(|_| {}).await;
    let mut ws = stack.connect("u1", 1).await;

    send_binary(&mut ws, send_msg_frame("u1", "u2", "c-1", "7")).await;
    let resp = next_response(&mut ws).await;

    assert_eq!(resp.err_code, ERR_OK, "{}", resp.err_msg);
    assert_eq!(resp.req_identifier, WS_SEND_MSG);
    assert_eq!(resp.msg_incr, "7");
    assert_eq!(resp.operation_id, "op-7");
    let ack: UserSendMsgResp = decode_payload(&resp.data).unwrap();
    assert_eq!(ack.client_msg_id, "c-1");
    assert_eq!(ack.server_msg_id, "c-1");
    assert!(ack.send_time > 0);

    let recipient = stack.log.records_for_key("u2");
    let sender = stack.log.records_for_key("u1");
    assert_eq!(recipient.len(), 1);
    assert_eq!(sender.len(), 1);
    let stored = decode_record(&recipient[0].value).unwrap();
    assert_eq!(stored.data.content, b"hello");
    assert_eq!(stored.data.send_time, ack.send_time);
    stack.stop();
}

#[tokio::test]
async fn responses_follow_request_order() {
    let stack = Stack::start(|_| {}).await;
    let mut ws = stack.connect("u1", 1).await;

    for i in 0..5 {
        send_binary(&mut ws, send_msg_frame("u1", "u2", &format!("c-{i}"), &i.to_string())).await;
    }
    for i in 0..5 {
        assert_eq!(next_response(&mut ws).await.msg_incr, i.to_string());
    }

    let order: Vec<String> = stack
        .log
        .records_for_key("u2")
        .iter()
        .map(|r| decode_record(&r.value).unwrap().data.client_msg_id)
        .collect();
    assert_eq!(order, vec!["c-0", "c-1", "c-2", "c-3", "c-4"]);
    stack.stop();
}

#[tokio::test]
async fn impersonation_closes_the_connection() {
    let stack = Stack::start(|_| {}).await;
    let mut ws = stack.connect("u1", 1).await;
    stack.wait_for_connections(1).await;

    send_binary(&mut ws, send_msg_frame("mallory", "u2", "c-1", "1")).await;
    expect_closed(&mut ws).await;

    stack.wait_for_connections(0).await;
    assert!(stack.log.is_empty());
    stack.stop();
}

#[tokio::test]
async fn forged_payload_sender_is_rejected() {
    let stack = Stack::start(|_| {}).await;
    let mut ws = stack.connect("u1", 1).await;

    let data = MsgData {
        send_id: "u3".into(),
        recv_id: "u2".into(),
        client_msg_id: "c-1".into(),
        session_type: SessionType::SingleChat.tag(),
        content_type: 101,
        content: b"hello".to_vec(),
        ..MsgData::default()
    };
    let request = RequestEnvelope {
        req_identifier: WS_SEND_MSG,
        token: "t-u1".into(),
        send_id: "u1".into(),
        operation_id: "op-1".into(),
        msg_incr: "1".into(),
        data: encode_payload(&data).unwrap(),
    };
    send_binary(&mut ws, encode_envelope(&request).unwrap()).await;

    let resp = next_response(&mut ws).await;
    assert_eq!(resp.err_code, ERR_VALIDATION);
    assert_eq!(resp.msg_incr, "1");
    assert!(stack.log.is_empty());
    stack.stop();
}

#[tokio::test]
async fn kick_policy_closes_the_earlier_socket() {
    let stack = Stack::start(|c| c.duplicate_login = DuplicateLoginPolicy::Kick).await;
    let mut first = stack.connect("u1", 1).await;
    stack.wait_for_connections(1).await;

    let mut second = stack.connect("u1", 1).await;
    expect_closed(&mut first).await;

    stack.wait_for_connections(1).await;
    send_binary(&mut second, send_msg_frame("u1", "u2", "c-1", "1")).await;
    assert_eq!(next_response(&mut second).await.err_code, ERR_OK);
    stack.stop();
}

#[tokio::test]
async fn heartbeat_gets_no_reply() {
    let stack = Stack::start(|_| {}).await;
    let mut ws = stack.connect("u1", 1).await;

    send_binary(&mut ws, bare_frame(WS_HEARTBEAT, "u1", "1")).await;
    send_binary(&mut ws, bare_frame(9999, "u1", "2")).await;

    let resp = next_response(&mut ws).await;
    assert_eq!(resp.msg_incr, "2");
    assert_eq!(resp.err_code, ERR_UNSUPPORTED_REQUEST);
    stack.stop();
}

#[tokio::test]
async fn unreachable_delivery_reports_backend_error() {
    let mut stack = Stack::start(|_| {}).await;
    stack.delivery.shutdown().shutdown();
    let task = stack.delivery_task.take().unwrap();
    tokio::time::timeout(TIMEOUT, task).await.unwrap().unwrap();

    let mut ws = stack.connect("u1", 1).await;
    send_binary(&mut ws, send_msg_frame("u1", "u2", "c-1", "1")).await;
    let resp = next_response(&mut ws).await;

    assert_eq!(resp.err_code, ERR_BACKEND_UNREACHABLE);
    assert!(stack.log.is_empty());
    stack.stop();
}
