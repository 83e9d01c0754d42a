//! In-memory transport and fixtures shared by unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::connection::{Connection, ConnectionInfo, FrameTransport, TransportError, TransportKind};

static NEXT_PORT: AtomicU64 = AtomicU64::new(40_000);

#[derive(Default)]
struct ProbeState {
    frames: Vec<Vec<u8>>,
    closes: usize,
    fail_writes: bool,
    hang_writes: bool,
}

/// Observes what a [`MockTransport`] was asked to do.
#[derive(Clone, Default)]
pub(crate) struct Probe {
    state: Arc<Mutex<ProbeState>>,
}

impl Probe {
    pub(crate) fn frames(&self) -> Vec<Vec<u8>> {
        self.state.lock().frames.clone()
    }

    pub(crate) fn close_count(&self) -> usize {
        self.state.lock().closes
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.close_count() > 0
    }

    pub(crate) fn fail_writes(&self) {
        self.state.lock().fail_writes = true;
    }

    pub(crate) fn hang_writes(&self) {
        self.state.lock().hang_writes = true;
    }
}

/// Transport that records frames instead of writing them.
pub(crate) struct MockTransport {
    probe: Probe,
}

impl MockTransport {
    pub(crate) fn new() -> (Self, Probe) {
        let probe = Probe::default();
        (
            Self {
                probe: probe.clone(),
            },
            probe,
        )
    }
}

#[async_trait]
impl FrameTransport for MockTransport {
    async fn send_binary(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        let (fail, hang) = {
            let state = self.probe.state.lock();
            (state.fail_writes, state.hang_writes)
        };
        if hang {
            std::future::pending::<()>().await;
        }
        if fail {
            return Err(TransportError::Io("broken pipe".into()));
        }
        // Yield so concurrent writers get a chance to interleave if the lock were missing.
        tokio::task::yield_now().await;
        self.probe.state.lock().frames.push(frame);
        Ok(())
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.probe.state.lock().closes += 1;
        Ok(())
    }
}

/// Identity for `user` on `platform` with a unique peer address.
pub(crate) fn info_for(user: &str, platform: i32) -> ConnectionInfo {
    let remote_addr = format!("127.0.0.1:{}", NEXT_PORT.fetch_add(1, Ordering::Relaxed));
    ConnectionInfo {
        user_id: user.to_owned(),
        platform_id: platform,
        token: format!("token-{user}"),
        conn_id: tidings_core::ids::connection_id(&remote_addr),
        remote_addr,
        operation_id: tidings_core::ids::operation_id(),
        kind: TransportKind::DuplexFrame,
    }
}

/// Standalone connection (not registered) plus its probe.
pub(crate) fn connection(user: &str, platform: i32) -> (Arc<Connection>, Probe) {
    let (transport, probe) = MockTransport::new();
    let conn = Connection::new(info_for(user, platform), Box::new(transport), Duration::from_secs(5));
    (Arc::new(conn), probe)
}
