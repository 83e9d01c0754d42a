//! Relay of chat sends to the delivery service.
//!
//! [`RelayHandler`] turns a validated send request into a [`SendMsgReq`],
//! hands it to a [`DeliveryBackend`], and wraps the outcome in a response
//! envelope. [`HttpDeliveryClient`] is the production backend: one pooled
//! HTTP client posting JSON-RPC to the delivery service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use tidings_core::codec;
use tidings_core::constants::{ERR_BACKEND_CALL, ERR_BACKEND_UNREACHABLE, ERR_VALIDATION, WS_SEND_MSG};
use tidings_core::protocol::{RequestEnvelope, ResponseEnvelope, SendMsgReq, SendMsgResp, UserSendMsgResp};
use tidings_core::retry::{RetryConfig, retry_with_backoff};
use tidings_rpc::methods::{RPC_PATH, SEND_MESSAGE};
use tidings_rpc::{RpcRequest, RpcResponse};
use tracing::{error, instrument, warn};

use crate::connection::Connection;
use crate::metrics::{GATEWAY_RELAY_DURATION_SECONDS, GATEWAY_RELAY_ERRORS_TOTAL, GATEWAY_RELAY_REQUESTS_TOTAL};
use crate::router::{RequestHandler, ValidatedPayload, args_validate};

/// Why a delivery call produced no answer.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    /// The delivery service could not be reached.
    #[error("delivery service unreachable: {0}")]
    Unreachable(String),
    /// The delivery service was reached but the call failed.
    #[error("delivery call failed: {0}")]
    Call(String),
}

impl RelayError {
    /// Response code reported to the client.
    pub fn code(&self) -> i32 {
        match self {
            Self::Unreachable(_) => ERR_BACKEND_UNREACHABLE,
            Self::Call(_) => ERR_BACKEND_CALL,
        }
    }
}

/// Something that can deliver a chat message.
#[async_trait]
pub trait DeliveryBackend: Send + Sync {
    /// Deliver `request`; the answer's code reports delivery outcome.
    async fn send_message(&self, request: SendMsgReq) -> Result<SendMsgResp, RelayError>;
}

/// JSON-RPC over HTTP client for the delivery service.
pub struct HttpDeliveryClient {
    client: reqwest::Client,
    endpoint: String,
    retry: RetryConfig,
}

impl HttpDeliveryClient {
    /// Client posting to `{base_url}/rpc`. Without a `request_timeout` a
    /// call waits for as long as the delivery service takes.
    pub fn new(
        base_url: &str,
        connect_timeout: Duration,
        request_timeout: Option<Duration>,
        retry: RetryConfig,
    ) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60));
        if let Some(timeout) = request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{RPC_PATH}", base_url.trim_end_matches('/')),
            retry,
        })
    }

    /// Full URL calls are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn call_once(&self, rpc: &RpcRequest) -> Result<SendMsgResp, RelayError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(rpc)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RelayError::Call(format!("delivery service returned HTTP {status}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| RelayError::Call(format!("invalid RPC response: {e}")))?;

        if !body.success {
            let detail = body
                .error
                .map_or_else(|| "unknown error".to_owned(), |e| format!("{}: {}", e.code, e.message));
            return Err(RelayError::Call(detail));
        }

        serde_json::from_value(body.result.unwrap_or_default())
            .map_err(|e| RelayError::Call(format!("invalid send result: {e}")))
    }
}

fn classify(err: reqwest::Error) -> RelayError {
    if err.is_connect() {
        RelayError::Unreachable(err.to_string())
    } else {
        RelayError::Call(err.to_string())
    }
}

#[async_trait]
impl DeliveryBackend for HttpDeliveryClient {
    #[instrument(skip_all, fields(operation_id = %request.operation_id))]
    async fn send_message(&self, request: SendMsgReq) -> Result<SendMsgResp, RelayError> {
        let params = serde_json::to_value(&request)
            .map_err(|e| RelayError::Call(format!("failed to encode request: {e}")))?;
        let rpc = RpcRequest::new(request.operation_id.clone(), SEND_MESSAGE, params);

        counter!(GATEWAY_RELAY_REQUESTS_TOTAL).increment(1);
        let start = Instant::now();
        let result = retry_with_backoff(
            &self.retry,
            |e: &RelayError| matches!(e, RelayError::Unreachable(_)),
            |attempt| {
                if attempt > 0 {
                    warn!(attempt, endpoint = %self.endpoint, "retrying unreachable delivery service");
                }
                self.call_once(&rpc)
            },
        )
        .await;
        histogram!(GATEWAY_RELAY_DURATION_SECONDS).record(start.elapsed().as_secs_f64());

        if let Err(e) = &result {
            let kind = match e {
                RelayError::Unreachable(_) => "unreachable",
                RelayError::Call(_) => "call",
            };
            counter!(GATEWAY_RELAY_ERRORS_TOTAL, "kind" => kind).increment(1);
        }
        result
    }
}

/// Handler for identifier 1003: validate, relay, reply.
pub struct RelayHandler {
    backend: Arc<dyn DeliveryBackend>,
}

impl RelayHandler {
    /// Relay through `backend`.
    pub fn new(backend: Arc<dyn DeliveryBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl RequestHandler for RelayHandler {
    #[instrument(skip_all, fields(conn_id = conn.conn_id(), operation_id = %request.operation_id))]
    async fn handle(&self, conn: &Connection, request: &RequestEnvelope) -> Option<ResponseEnvelope> {
        let outcome = match args_validate(request, WS_SEND_MSG) {
            Err(rejection) => SendMsgResp::failure(rejection.err_code, rejection.err_msg),
            Ok(ValidatedPayload::SendMsg(data)) if data.send_id != conn.user_id() => {
                warn!(send_id = %data.send_id, user_id = %conn.user_id(), "message sender does not match connection user");
                SendMsgResp::failure(ERR_VALIDATION, "sendID does not match connection user")
            }
            Ok(ValidatedPayload::SendMsg(data)) => {
                let relay = SendMsgReq {
                    token: request.token.clone(),
                    operation_id: request.operation_id.clone(),
                    data,
                };
                match self.backend.send_message(relay).await {
                    Ok(resp) => resp,
                    Err(e) => {
                        warn!(error = %e, "delivery relay failed");
                        SendMsgResp::failure(e.code(), e.to_string())
                    }
                }
            }
        };
        Some(send_msg_response(request, &outcome))
    }
}

/// Wrap a delivery outcome in a response envelope for `request`.
pub fn send_msg_response(request: &RequestEnvelope, outcome: &SendMsgResp) -> ResponseEnvelope {
    let ack = UserSendMsgResp::from(outcome);
    let data = codec::encode_payload(&ack).unwrap_or_else(|e| {
        error!(error = %e, "failed to encode send acknowledgement");
        Vec::new()
    });
    ResponseEnvelope::reply_to(request, outcome.err_code, outcome.err_msg.clone(), data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::connection;
    use assert_matches::assert_matches;
    use parking_lot::Mutex;
    use tidings_core::constants::{ERR_OK, SessionType};
    use tidings_core::protocol::MsgData;

    struct RecordingBackend {
        calls: Mutex<Vec<SendMsgReq>>,
        answer: fn(&SendMsgReq) -> Result<SendMsgResp, RelayError>,
    }

    impl RecordingBackend {
        fn new(answer: fn(&SendMsgReq) -> Result<SendMsgResp, RelayError>) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                answer,
            })
        }
    }

    #[async_trait]
    impl DeliveryBackend for RecordingBackend {
        async fn send_message(&self, request: SendMsgReq) -> Result<SendMsgResp, RelayError> {
            let answer = (self.answer)(&request);
            self.calls.lock().push(request);
            answer
        }
    }

    fn accepted(req: &SendMsgReq) -> Result<SendMsgResp, RelayError> {
        Ok(SendMsgResp {
            err_code: ERR_OK,
            err_msg: String::new(),
            server_msg_id: format!("srv-{}", req.data.client_msg_id),
            client_msg_id: req.data.client_msg_id.clone(),
            send_time: 1_700_000_000_000,
        })
    }

    fn send_request(data: &MsgData) -> RequestEnvelope {
        RequestEnvelope {
            req_identifier: WS_SEND_MSG,
            token: "tok".into(),
            send_id: data.send_id.clone(),
            operation_id: "op-42".into(),
            msg_incr: "3".into(),
            data: codec::encode_payload(data).unwrap(),
        }
    }

    fn chat() -> MsgData {
        MsgData {
            send_id: "u1".into(),
            recv_id: "u2".into(),
            client_msg_id: "c1".into(),
            session_type: SessionType::SingleChat.tag(),
            content_type: 101,
            content: b"hi".to_vec(),
            ..MsgData::default()
        }
    }

    // ── RelayHandler ────────────────────────────────────────────────

    #[tokio::test]
    async fn success_carries_server_ack() {
        let backend = RecordingBackend::new(accepted);
        let handler = RelayHandler::new(backend.clone());
        let (conn, _) = connection("u1", 1);

        let resp = handler.handle(&conn, &send_request(&chat())).await.unwrap();
        assert_eq!(resp.err_code, ERR_OK);
        assert_eq!(resp.req_identifier, WS_SEND_MSG);
        assert_eq!(resp.msg_incr, "3");
        let ack: UserSendMsgResp = codec::decode_payload(&resp.data).unwrap();
        assert_eq!(ack.server_msg_id, "srv-c1");
        assert_eq!(ack.client_msg_id, "c1");
        assert_eq!(ack.send_time, 1_700_000_000_000);

        let calls = backend.calls.lock();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].token, "tok");
        assert_eq!(calls[0].operation_id, "op-42");
        assert_eq!(calls[0].data, chat());
    }

    #[tokio::test]
    async fn invalid_payload_never_reaches_backend() {
        let backend = RecordingBackend::new(accepted);
        let handler = RelayHandler::new(backend.clone());
        let (conn, _) = connection("u1", 1);

        let mut bad = chat();
        bad.client_msg_id.clear();
        let resp = handler.handle(&conn, &send_request(&bad)).await.unwrap();
        assert_eq!(resp.err_code, 204);
        assert!(backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn foreign_sender_in_payload_is_rejected() {
        let backend = RecordingBackend::new(accepted);
        let handler = RelayHandler::new(backend.clone());
        let (conn, _) = connection("u1", 1);

        let mut forged = chat();
        forged.send_id = "u3".into();
        let mut request = send_request(&forged);
        request.send_id = "u1".into();

        let resp = handler.handle(&conn, &request).await.unwrap();
        assert_eq!(resp.err_code, ERR_VALIDATION);
        assert_eq!(resp.err_msg, "sendID does not match connection user");
        assert_eq!(resp.msg_incr, "3");
        assert!(backend.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn unreachable_maps_to_201() {
        let backend = RecordingBackend::new(|_| Err(RelayError::Unreachable("connection refused".into())));
        let handler = RelayHandler::new(backend);
        let (conn, _) = connection("u1", 1);

        let resp = handler.handle(&conn, &send_request(&chat())).await.unwrap();
        assert_eq!(resp.err_code, ERR_BACKEND_UNREACHABLE);
        assert!(resp.err_msg.contains("connection refused"));
        let ack: UserSendMsgResp = codec::decode_payload(&resp.data).unwrap();
        assert!(ack.server_msg_id.is_empty());
    }

    #[tokio::test]
    async fn call_failure_maps_to_200() {
        let backend = RecordingBackend::new(|_| Err(RelayError::Call("HTTP 500".into())));
        let handler = RelayHandler::new(backend);
        let (conn, _) = connection("u1", 1);

        let resp = handler.handle(&conn, &send_request(&chat())).await.unwrap();
        assert_eq!(resp.err_code, ERR_BACKEND_CALL);
    }

    #[tokio::test]
    async fn delivery_codes_pass_through() {
        let backend = RecordingBackend::new(|_| Ok(SendMsgResp::failure(203, "group session type not supported")));
        let handler = RelayHandler::new(backend);
        let (conn, _) = connection("u1", 1);

        let resp = handler.handle(&conn, &send_request(&chat())).await.unwrap();
        assert_eq!(resp.err_code, 203);
        assert_eq!(resp.err_msg, "group session type not supported");
    }

    // ── HttpDeliveryClient ──────────────────────────────────────────

    #[test]
    fn endpoint_joins_rpc_path() {
        let client =
            HttpDeliveryClient::new("http://127.0.0.1:7749/", Duration::from_secs(1), None, RetryConfig::none())
                .unwrap();
        assert_eq!(client.endpoint(), "http://127.0.0.1:7749/rpc");
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let client = HttpDeliveryClient::new(
            &format!("http://127.0.0.1:{port}"),
            Duration::from_secs(1),
            None,
            RetryConfig::none(),
        )
        .unwrap();

        let req = SendMsgReq {
            token: "t".into(),
            operation_id: "op".into(),
            data: chat(),
        };
        let err = client.send_message(req).await.unwrap_err();
        assert_matches!(err, RelayError::Unreachable(_));
        assert_eq!(err.code(), 201);
    }

    #[tokio::test]
    async fn http_error_status_is_call_failure() {
        use axum::http::StatusCode;
        use axum::routing::post;

        let app = axum::Router::new().route(RPC_PATH, post(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move { axum::serve(listener, app).await.ok() });

        let client =
            HttpDeliveryClient::new(&format!("http://{addr}"), Duration::from_secs(1), None, RetryConfig::none())
                .unwrap();
        let req = SendMsgReq {
            token: "t".into(),
            operation_id: "op".into(),
            data: chat(),
        };
        let err = client.send_message(req).await.unwrap_err();
        assert_matches!(err, RelayError::Call(ref m) if m.contains("500"));
        assert_eq!(err.code(), 200);
    }

    #[tokio::test]
    async fn rpc_error_body_is_call_failure() {
        use axum::Json;
        use axum::routing::post;

        let app = axum::Router::new().route(
            RPC_PATH,
            post(|Json(req): Json<RpcRequest>| async move {
                Json(RpcResponse::error(req.id, "INVALID_PARAMS", "bad"))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move { axum::serve(listener, app).await.ok() });

        let client =
            HttpDeliveryClient::new(&format!("http://{addr}"), Duration::from_secs(1), None, RetryConfig::none())
                .unwrap();
        let req = SendMsgReq {
            token: "t".into(),
            operation_id: "op".into(),
            data: chat(),
        };
        let err = client.send_message(req).await.unwrap_err();
        assert_matches!(err, RelayError::Call(ref m) if m == "INVALID_PARAMS: bad");
    }

    #[tokio::test]
    async fn slow_delivery_hits_request_timeout() {
        use axum::Json;
        use axum::routing::post;

        let app = axum::Router::new().route(
            RPC_PATH,
            post(|Json(req): Json<RpcRequest>| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(RpcResponse::error(req.id, "LATE", "too late"))
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move { axum::serve(listener, app).await.ok() });

        let client = HttpDeliveryClient::new(
            &format!("http://{addr}"),
            Duration::from_secs(1),
            Some(Duration::from_millis(100)),
            RetryConfig::none(),
        )
        .unwrap();
        let req = SendMsgReq {
            token: "t".into(),
            operation_id: "op".into(),
            data: chat(),
        };
        let err = tokio::time::timeout(Duration::from_secs(3), client.send_message(req))
            .await
            .unwrap()
            .unwrap_err();
        assert_matches!(err, RelayError::Call(_));
        assert_eq!(err.code(), ERR_BACKEND_CALL);
    }
}
