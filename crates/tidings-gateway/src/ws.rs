//! Axum `WebSocket` adapters for the session loop.

use axum::extract::ws::{Message, WebSocket};
use async_trait::async_trait;
use futures::SinkExt;
use futures::stream::SplitSink;

use crate::connection::{FrameTransport, TransportError};
use crate::session::InboundFrame;

/// Write half of an upgraded socket.
pub struct WsSink {
    sink: SplitSink<WebSocket, Message>,
}

impl WsSink {
    /// Wrap the write half returned by `WebSocket::split`.
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self { sink }
    }
}

#[async_trait]
impl FrameTransport for WsSink {
    async fn send_binary(&mut self, frame: Vec<u8>) -> Result<(), TransportError> {
        self.sink
            .send(Message::Binary(frame.into()))
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.sink
            .close()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))
    }
}

impl From<Message> for InboundFrame {
    fn from(msg: Message) -> Self {
        match msg {
            Message::Binary(bytes) => Self::Binary(bytes.to_vec()),
            Message::Text(text) => Self::Text(text.as_str().to_owned()),
            Message::Ping(_) => Self::Ping,
            Message::Pong(_) => Self::Pong,
            Message::Close(_) => Self::Close,
        }
    }
}
