//! # tidings
//!
//! Process entry point. Loads settings, installs logging and metrics, then
//! runs the gateway, the delivery service, or both until a shutdown signal.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tidings_core::logging::{LogFormat, init_subscriber};
use tidings_core::shutdown::ShutdownCoordinator;
use tidings_delivery::{ChatService, DeliveryConfig, DeliveryServer, MemoryEventLog};
use tidings_gateway::metrics::PrometheusHandle;
use tidings_gateway::relay::HttpDeliveryClient;
use tidings_gateway::{GatewayConfig, GatewayServer, default_router};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Tidings IM gateway.
#[derive(Parser, Debug)]
#[command(name = "tidings", about = "Instant-messaging gateway and delivery service")]
struct Cli {
    /// Settings file (defaults to `~/.tidings/settings.json`).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Client-facing `WebSocket` gateway.
    Gateway {
        /// Port to bind (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Delivery service backed by the in-memory event log.
    Delivery {
        /// Port to bind (overrides settings).
        #[arg(long)]
        port: Option<u16>,
    },
    /// Both processes in one, for local development.
    All,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.settings {
        Some(path) => tidings_settings::load_settings_from_path(path),
        None => tidings_settings::load_settings(),
    }
    .context("failed to load settings")?;

    let format = if settings.logging.json { LogFormat::Json } else { LogFormat::Compact };
    init_subscriber(&settings.logging.level, format);

    let metrics = match tidings_gateway::metrics::install_recorder() {
        Ok(handle) => Some(handle),
        Err(e) => {
            warn!(error = %e, "metrics recorder not installed");
            None
        }
    };

    let shutdown = ShutdownCoordinator::new();
    let mut tasks = Vec::new();

    match cli.command {
        Command::Gateway { port } => {
            let mut config = GatewayConfig::from_settings(&settings.gateway);
            if let Some(port) = port {
                config.port = port;
            }
            let server = build_gateway(config, metrics, &shutdown)?;
            tasks.push(start_gateway(&server).await?);
        }
        Command::Delivery { port } => {
            let mut config = DeliveryConfig::from_settings(&settings.delivery);
            if let Some(port) = port {
                config.port = port;
            }
            let server = build_delivery(config, metrics, &shutdown);
            tasks.push(start_delivery(&server).await?);
        }
        Command::All => {
            let delivery = build_delivery(DeliveryConfig::from_settings(&settings.delivery), metrics.clone(), &shutdown);
            tasks.push(start_delivery(&delivery).await?);
            let gateway = build_gateway(GatewayConfig::from_settings(&settings.gateway), metrics, &shutdown)?;
            tasks.push(start_gateway(&gateway).await?);
        }
    }

    info!(name = %settings.name, version = %settings.version, "started");
    shutdown.wait_for_signal().await;
    info!("shutdown signal received, draining");
    shutdown.drain(tasks, None).await;
    Ok(())
}

fn build_gateway(
    config: GatewayConfig,
    metrics: Option<PrometheusHandle>,
    shutdown: &ShutdownCoordinator,
) -> Result<GatewayServer> {
    let client = HttpDeliveryClient::new(
        &config.delivery_url,
        config.connect_timeout,
        config.request_timeout,
        config.relay_retry.clone(),
    )
    .context("failed to build delivery client")?;
    let router = default_router(Arc::new(client));
    let mut server = GatewayServer::new(config, router).with_shutdown(shutdown.clone());
    if let Some(handle) = metrics {
        server = server.with_metrics(handle);
    }
    Ok(server)
}

async fn start_gateway(server: &GatewayServer) -> Result<JoinHandle<()>> {
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind gateway on {}", server.config().bind_addr()))?;
    info!(%addr, delivery_url = %server.config().delivery_url, "gateway ready");
    Ok(handle)
}

fn build_delivery(
    config: DeliveryConfig,
    metrics: Option<PrometheusHandle>,
    shutdown: &ShutdownCoordinator,
) -> DeliveryServer {
    let log = Arc::new(MemoryEventLog::new(&config.topic, config.partitions));
    let chat = ChatService::new(log, config.topic.clone(), config.publish_retry.clone(), config.dedupe_capacity);
    let mut server = DeliveryServer::new(config, Arc::new(chat)).with_shutdown(shutdown.clone());
    if let Some(handle) = metrics {
        server = server.with_metrics(handle);
    }
    server
}

async fn start_delivery(server: &DeliveryServer) -> Result<JoinHandle<()>> {
    let (addr, handle) = server
        .listen()
        .await
        .with_context(|| format!("failed to bind delivery service on {}", server.config().bind_addr()))?;
    info!(%addr, topic = %server.config().topic, "delivery service ready");
    Ok(handle)
}
