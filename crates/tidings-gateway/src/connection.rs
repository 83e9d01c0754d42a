//! One client socket: identity plus a serialized writer.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

/// Process-wide source of connection handles.
static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);

/// Failure writing to or closing a transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The write did not finish before the deadline.
    #[error("write timed out after {0:?}")]
    Timeout(Duration),
    /// The connection was already closed locally.
    #[error("connection closed")]
    Closed,
    /// The underlying socket reported an error.
    #[error("transport error: {0}")]
    Io(String),
}

/// How the client reached the gateway.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportKind {
    /// Raw socket stream.
    SocketStream,
    /// Full-duplex framed socket (`WebSocket`).
    DuplexFrame,
}

/// Outbound half of a client socket.
///
/// Callers never invoke this concurrently for one connection; [`Connection`]
/// serializes access.
#[async_trait]
pub trait FrameTransport: Send {
    /// Write one binary frame.
    async fn send_binary(&mut self, frame: Vec<u8>) -> Result<(), TransportError>;
    /// Close the socket.
    async fn close(&mut self) -> Result<(), TransportError>;
}

/// Identity captured at upgrade time.
#[derive(Clone, Debug)]
pub struct ConnectionInfo {
    /// Authenticated user.
    pub user_id: String,
    /// Client platform id.
    pub platform_id: i32,
    /// Token presented at upgrade.
    pub token: String,
    /// `remoteAddr_millis`.
    pub conn_id: String,
    /// Peer address.
    pub remote_addr: String,
    /// Operation id of the upgrade request.
    pub operation_id: String,
    /// Transport flavour.
    pub kind: TransportKind,
}

/// A live client connection.
///
/// Identity fields are immutable after construction. Writes from any task go
/// through one async mutex so frames never interleave.
pub struct Connection {
    handle: u64,
    info: ConnectionInfo,
    connected_at: Instant,
    write_timeout: Duration,
    writer: Mutex<Box<dyn FrameTransport>>,
    closed: AtomicBool,
}

impl Connection {
    /// Wrap `transport` with the given identity.
    pub fn new(info: ConnectionInfo, transport: Box<dyn FrameTransport>, write_timeout: Duration) -> Self {
        Self {
            handle: NEXT_HANDLE.fetch_add(1, Ordering::Relaxed),
            info,
            connected_at: Instant::now(),
            write_timeout,
            writer: Mutex::new(transport),
            closed: AtomicBool::new(false),
        }
    }

    /// Process-unique handle, used as the reverse-index key.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    /// Authenticated user id.
    pub fn user_id(&self) -> &str {
        &self.info.user_id
    }

    /// Client platform id.
    pub fn platform_id(&self) -> i32 {
        self.info.platform_id
    }

    /// Token presented at upgrade.
    pub fn token(&self) -> &str {
        &self.info.token
    }

    /// Connection id (`remoteAddr_millis`).
    pub fn conn_id(&self) -> &str {
        &self.info.conn_id
    }

    /// Peer address.
    pub fn remote_addr(&self) -> &str {
        &self.info.remote_addr
    }

    /// Full identity record.
    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Time since the upgrade completed.
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Write one binary frame under the writer lock, bounded by the write deadline.
    pub async fn write_frame(&self, frame: Vec<u8>) -> Result<(), TransportError> {
        if self.is_closed() {
            return Err(TransportError::Closed);
        }
        let mut writer = self.writer.lock().await;
        tokio::time::timeout(self.write_timeout, writer.send_binary(frame))
            .await
            .map_err(|_| TransportError::Timeout(self.write_timeout))?
    }

    /// Close the transport. Only the first call reaches the socket.
    pub async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut writer = self.writer.lock().await;
        tokio::time::timeout(self.write_timeout, writer.close())
            .await
            .map_err(|_| TransportError::Timeout(self.write_timeout))?
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("handle", &self.handle)
            .field("user_id", &self.info.user_id)
            .field("platform_id", &self.info.platform_id)
            .field("conn_id", &self.info.conn_id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
