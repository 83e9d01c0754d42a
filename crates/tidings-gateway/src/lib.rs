//! # tidings-gateway
//!
//! Client-facing `WebSocket` gateway.
//!
//! - Upgrade: query-parameter identity, capacity check, pluggable token check
//! - Registry: `(user, platform)` → connection, with a reverse index per socket
//! - Session loop: per-connection decode, validate, identity check, dispatch, reply
//! - Router: request identifier → handler, plus payload validation
//! - Relay: forwards chat sends to the delivery service over HTTP
//! - HTTP endpoints: `/health`, `/metrics`

#![deny(unsafe_code)]

pub mod config;
pub mod connection;
pub mod health;
pub mod heartbeat;
pub mod metrics;
pub mod registry;
pub mod relay;
pub mod router;
pub mod server;
pub mod session;
pub mod upgrade;
pub mod ws;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::GatewayConfig;
pub use connection::{Connection, ConnectionInfo, FrameTransport, TransportError, TransportKind};
pub use registry::ConnectionRegistry;
pub use router::{RequestHandler, Router};
pub use server::GatewayServer;

/// Router with the standard handlers: heartbeat and chat send via `backend`.
pub fn default_router(backend: std::sync::Arc<dyn relay::DeliveryBackend>) -> Router {
    let mut router = Router::new();
    router.register(tidings_core::constants::WS_SEND_MSG, relay::RelayHandler::new(backend));
    router.register(tidings_core::constants::WS_HEARTBEAT, heartbeat::HeartbeatHandler);
    router
}
