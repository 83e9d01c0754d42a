//! Application-level heartbeat (identifier 1004).

use async_trait::async_trait;
use tidings_core::protocol::{RequestEnvelope, ResponseEnvelope};
use tracing::trace;

use crate::connection::Connection;
use crate::router::RequestHandler;

/// Acknowledges liveness without replying.
#[derive(Debug, Default, Clone, Copy)]
pub struct HeartbeatHandler;

#[async_trait]
impl RequestHandler for HeartbeatHandler {
    async fn handle(&self, conn: &Connection, request: &RequestEnvelope) -> Option<ResponseEnvelope> {
        trace!(conn_id = conn.conn_id(), msg_incr = %request.msg_incr, "heartbeat");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::connection;
    use tidings_core::constants::WS_HEARTBEAT;

    #[tokio::test]
    async fn heartbeat_produces_no_reply_and_no_write() {
        let (conn, probe) = connection("u1", 1);
        let request = RequestEnvelope {
            req_identifier: WS_HEARTBEAT,
            send_id: "u1".into(),
            operation_id: "op".into(),
            msg_incr: "7".into(),
            ..RequestEnvelope::default()
        };
        assert!(HeartbeatHandler.handle(&conn, &request).await.is_none());
        assert!(probe.frames().is_empty());
    }
}
