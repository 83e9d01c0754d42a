//! `DeliveryServer`: Axum listener for relay RPC, health and metrics.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Serialize;
use tidings_core::shutdown::ShutdownCoordinator;
use tidings_rpc::errors::PARSE_ERROR;
use tidings_rpc::methods::RPC_PATH;
use tidings_rpc::{MethodRegistry, RpcRequest, RpcResponse};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::DeliveryConfig;
use crate::rpc::{self, DeliveryContext};
use crate::service::{ChatService, DeliveryStats};

/// Health check response body.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Always `"ok"` while the listener is up.
    pub status: String,
    /// Seconds since the service started.
    pub uptime_secs: u64,
    /// Topic records are published to.
    pub topic: String,
    /// Running delivery totals.
    pub stats: DeliveryStats,
}

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
struct AppState {
    registry: Arc<MethodRegistry<DeliveryContext>>,
    ctx: Arc<DeliveryContext>,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

/// The delivery service listener.
pub struct DeliveryServer {
    config: DeliveryConfig,
    registry: Arc<MethodRegistry<DeliveryContext>>,
    ctx: Arc<DeliveryContext>,
    shutdown: ShutdownCoordinator,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl DeliveryServer {
    /// Serve the chat methods backed by `chat`.
    pub fn new(config: DeliveryConfig, chat: Arc<ChatService>) -> Self {
        let mut registry = MethodRegistry::new();
        rpc::register_all(&mut registry);
        Self {
            config,
            registry: Arc::new(registry),
            ctx: Arc::new(DeliveryContext { chat }),
            shutdown: ShutdownCoordinator::new(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Serve `/metrics` from `handle`.
    #[must_use]
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }

    /// Share a process-wide shutdown coordinator.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: ShutdownCoordinator) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Build the Axum router with all routes.
    pub fn routes(&self) -> axum::Router {
        let state = AppState {
            registry: self.registry.clone(),
            ctx: self.ctx.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        axum::Router::new()
            .route(RPC_PATH, post(rpc_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in a background task. Returns the bound address.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.routes();
        let token = self.shutdown.token();

        info!(%addr, topic = %self.config.topic, "delivery service listening");

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app).with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "delivery server stopped with error");
            }
        });

        Ok((addr, handle))
    }

    /// The chat service behind the RPC methods.
    pub fn chat(&self) -> &Arc<ChatService> {
        &self.ctx.chat
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Listener configuration.
    pub fn config(&self) -> &DeliveryConfig {
        &self.config
    }
}

/// POST /rpc
async fn rpc_handler(State(state): State<AppState>, body: Bytes) -> Response {
    let request: RpcRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "malformed RPC request");
            let resp = RpcResponse::error("", PARSE_ERROR, format!("malformed request: {e}"));
            return (StatusCode::BAD_REQUEST, Json(resp)).into_response();
        }
    };
    Json(state.registry.dispatch(request, &state.ctx).await).into_response()
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".into(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        topic: state.ctx.chat.topic().to_owned(),
        stats: state.ctx.chat.stats(),
    })
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => handle.render().into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
