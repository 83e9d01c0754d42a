//! Per-connection read loop.
//!
//! Frames from one connection are handled strictly in arrival order: the
//! next frame is not read until the previous one has been dispatched and
//! its reply written.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::{FutureExt, Stream, StreamExt};
use metrics::counter;
use tidings_core::codec;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::connection::Connection;
use crate::metrics::{GATEWAY_FRAMES_DROPPED_TOTAL, GATEWAY_FRAMES_TOTAL};
use crate::registry::ConnectionRegistry;
use crate::router::Router;

/// One inbound message, independent of the socket library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// Binary payload.
    Binary(Vec<u8>),
    /// Text payload; decoded the same way as binary.
    Text(String),
    /// Transport-level ping.
    Ping,
    /// Transport-level pong.
    Pong,
    /// Peer requested close.
    Close,
}

/// Why a session loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer sent a close frame.
    PeerClosed,
    /// Inbound stream ended without a close frame.
    StreamEnded,
    /// Reading from the socket failed.
    ReadError,
    /// A frame claimed a different sender than the connection's user.
    IdentityMismatch,
    /// The process is shutting down.
    Shutdown,
}

/// What the loop does after one frame.
enum FrameOutcome {
    Continue,
    Terminate,
}

/// Shared collaborators for every session loop.
#[derive(Clone)]
pub struct SessionContext {
    /// Online-user registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Request router.
    pub router: Arc<Router>,
    /// Cancelled on process shutdown.
    pub shutdown: CancellationToken,
}

/// Drive `conn` until the peer leaves, the socket fails, or a frame
/// violates the connection's identity. Always deregisters `conn` on exit.
#[instrument(skip_all, fields(user_id = conn.user_id(), platform_id = conn.platform_id(), conn_id = conn.conn_id()))]
pub async fn run_session<S, E>(conn: Arc<Connection>, mut inbound: S, ctx: SessionContext) -> SessionEnd
where
    S: Stream<Item = Result<InboundFrame, E>> + Unpin,
    E: std::fmt::Display,
{
    let end = loop {
        let Some(next) = tokio::select! (
            () = ctx.shutdown.cancelled() => None,
            next = inbound.next() => Some(next),
        ) else {
            break SessionEnd::Shutdown;
        };

        let frame = match next {
            None => break SessionEnd::StreamEnded,
            Some(Err(e)) => {
                warn!(error = %e, "read failed");
                break SessionEnd::ReadError;
            }
            Some(Ok(frame)) => frame,
        };

        let bytes = match frame {
            InboundFrame::Binary(bytes) => bytes,
            InboundFrame::Text(text) => text.into_bytes(),
            InboundFrame::Ping => {
                debug!("ping received");
                continue;
            }
            InboundFrame::Pong => continue,
            InboundFrame::Close => break SessionEnd::PeerClosed,
        };

        match AssertUnwindSafe(process_frame(&conn, &bytes, &ctx.router))
            .catch_unwind()
            .await
        {
            Ok(FrameOutcome::Continue) => {}
            Ok(FrameOutcome::Terminate) => break SessionEnd::IdentityMismatch,
            Err(_) => {
                error!(len = bytes.len(), "frame handler panicked; frame dropped");
                counter!(GATEWAY_FRAMES_DROPPED_TOTAL, "reason" => "panic").increment(1);
            }
        }
    };

    info!(reason = ?end, age_secs = conn.age().as_secs(), "session ended");
    ctx.registry.remove(&conn).await;
    end
}

async fn process_frame(conn: &Connection, bytes: &[u8], router: &Router) -> FrameOutcome {
    let request = match codec::decode_request(bytes) {
        Ok(request) => request,
        Err(e) => {
            warn!(len = bytes.len(), error = %e, "frame decode failed; dropped");
            counter!(GATEWAY_FRAMES_DROPPED_TOTAL, "reason" => "decode").increment(1);
            return FrameOutcome::Continue;
        }
    };

    if let Err(e) = request.validate() {
        warn!(operation_id = %request.operation_id, error = %e, "frame validation failed; dropped");
        counter!(GATEWAY_FRAMES_DROPPED_TOTAL, "reason" => "validation").increment(1);
        return FrameOutcome::Continue;
    }

    if request.send_id != conn.user_id() {
        warn!(
            send_id = %request.send_id,
            operation_id = %request.operation_id,
            "sender does not match connection user; closing"
        );
        counter!(GATEWAY_FRAMES_DROPPED_TOTAL, "reason" => "identity").increment(1);
        return FrameOutcome::Terminate;
    }

    counter!(GATEWAY_FRAMES_TOTAL, "identifier" => request.req_identifier.to_string()).increment(1);
    let Some(response) = router.dispatch(conn, &request).await else {
        return FrameOutcome::Continue;
    };

    match codec::encode_response(&response) {
        Ok(frame) => {
            if let Err(e) = conn.write_frame(frame).await {
                warn!(operation_id = %request.operation_id, error = %e, "failed to write response");
            }
        }
        Err(e) => error!(operation_id = %request.operation_id, error = %e, "failed to encode response"),
    }
    FrameOutcome::Continue
}
