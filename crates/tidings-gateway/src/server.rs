//! `GatewayServer`: Axum listener for client upgrades plus health and metrics.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use futures::StreamExt;
use metrics::counter;
use metrics_exporter_prometheus::PrometheusHandle;
use tidings_core::ids;
use tidings_core::shutdown::ShutdownCoordinator;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::GatewayConfig;
use crate::connection::{ConnectionInfo, TransportKind};
use crate::health::{self, HealthResponse};
use crate::metrics::{self as gateway_metrics, GATEWAY_UPGRADES_REJECTED_TOTAL};
use crate::registry::ConnectionRegistry;
use crate::router::Router;
use crate::session::{InboundFrame, SessionContext, run_session};
use crate::upgrade::{AllowAll, Authenticator, UpgradeParams};
use crate::ws::WsSink;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Listener configuration.
    pub config: Arc<GatewayConfig>,
    /// Online-user registry.
    pub registry: Arc<ConnectionRegistry>,
    /// Request router.
    pub router: Arc<Router>,
    /// Upgrade token check.
    pub authenticator: Arc<dyn Authenticator>,
    /// Process shutdown.
    pub shutdown: ShutdownCoordinator,
    /// When the gateway started.
    pub start_time: Instant,
    /// Prometheus handle, when a recorder is installed.
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    fn session_context(&self) -> SessionContext {
        SessionContext {
            registry: self.registry.clone(),
            router: self.router.clone(),
            shutdown: self.shutdown.token(),
        }
    }
}

/// The client-facing gateway.
pub struct GatewayServer {
    config: Arc<GatewayConfig>,
    registry: Arc<ConnectionRegistry>,
    router: Arc<Router>,
    authenticator: Arc<dyn Authenticator>,
    shutdown: ShutdownCoordinator,
    start_time: Instant,
    metrics: Option<PrometheusHandle>,
}

impl GatewayServer {
    /// Create a gateway dispatching through `router`.
    pub fn new(config: GatewayConfig, router: Router) -> Self {
        let registry = ConnectionRegistry::new(config.duplicate_login, config.write_timeout);
        Self {
            config: Arc::new(config),
            registry: Arc::new(registry),
            router: Arc::new(router),
            authenticator: Arc::new(AllowAll),
            shutdown: ShutdownCoordinator::new(),
            start_time: Instant::now(),
            metrics: None,
        }
    }

    /// Replace the default accept-all token check.
    #[must_use]
    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
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
            config: self.config.clone(),
            registry: self.registry.clone(),
            router: self.router.clone(),
            authenticator: self.authenticator.clone(),
            shutdown: self.shutdown.clone(),
            start_time: self.start_time,
            metrics: self.metrics.clone(),
        };

        axum::Router::new()
            .route("/", get(ws_handler))
            .route("/ws", get(ws_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(self.config.handshake_timeout))
            .layer(TraceLayer::new_for_http())
    }

    /// Bind and serve in a background task. Returns the bound address.
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let app = self.routes();
        let token = self.shutdown.token();

        info!(%addr, max_connections = self.config.max_connections, "gateway listening");

        let handle = tokio::spawn(async move {
            let serve = axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move { token.cancelled().await });
            if let Err(e) = serve.await {
                error!(error = %e, "gateway server stopped with error");
            }
        });

        Ok((addr, handle))
    }

    /// Online-user registry.
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Shutdown coordinator.
    pub fn shutdown(&self) -> &ShutdownCoordinator {
        &self.shutdown
    }

    /// Listener configuration.
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }
}

/// GET / and /ws: client upgrade.
async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    Query(query): Query<HashMap<String, String>>,
    State(state): State<AppState>,
) -> Response {
    let params = match UpgradeParams::from_query(&query) {
        Ok(params) => params,
        Err(e) => {
            warn!(%peer, error = %e, "upgrade rejected");
            counter!(GATEWAY_UPGRADES_REJECTED_TOTAL, "reason" => "params").increment(1);
            return (StatusCode::BAD_REQUEST, e.to_string()).into_response();
        }
    };

    if state.registry.connection_count() >= state.config.max_connections {
        warn!(%peer, max = state.config.max_connections, "upgrade rejected: at capacity");
        counter!(GATEWAY_UPGRADES_REJECTED_TOTAL, "reason" => "capacity").increment(1);
        return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
    }

    if let Err(e) = state.authenticator.authenticate(&params).await {
        warn!(%peer, user_id = %params.user_id, error = %e, "upgrade rejected");
        counter!(GATEWAY_UPGRADES_REJECTED_TOTAL, "reason" => "auth").increment(1);
        return (StatusCode::UNAUTHORIZED, e.to_string()).into_response();
    }

    ws.max_message_size(state.config.max_message_size)
        .on_failed_upgrade(move |e| warn!(%peer, error = %e, "websocket handshake failed"))
        .on_upgrade(move |socket| serve_socket(socket, peer, params, state))
}

async fn serve_socket(socket: WebSocket, peer: SocketAddr, params: UpgradeParams, state: AppState) {
    let (sink, stream) = socket.split();
    let remote_addr = peer.to_string();
    let info = ConnectionInfo {
        user_id: params.user_id,
        platform_id: params.platform_id,
        token: params.token,
        conn_id: ids::connection_id(&remote_addr),
        remote_addr,
        operation_id: params.operation_id,
        kind: TransportKind::DuplexFrame,
    };

    let added = state.registry.add(info, Box::new(WsSink::new(sink))).await;
    let inbound = stream.map(|item| item.map(InboundFrame::from));
    let _ = run_session(added.connection, inbound, state.session_context()).await;
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(
        state.start_time,
        state.registry.connection_count(),
        state.registry.user_count(),
    ))
}

/// GET /metrics
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => gateway_metrics::render(handle).into_response(),
        None => (StatusCode::NOT_FOUND, "metrics recorder not installed").into_response(),
    }
}
