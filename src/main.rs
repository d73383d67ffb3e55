//! HTTP/JSON → RPC gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌────────────────────────────────────────────────┐
//!                        │                    GATEWAY                      │
//!                        │                                                 │
//!   HTTP Request         │  ┌─────────┐   ┌──────────┐   ┌────────────┐   │
//!   ─────────────────────┼─▶│  http   │──▶│ routing  │──▶│  marshal   │   │
//!                        │  │ server  │   │ patterns │   │  decode    │   │
//!                        │  └─────────┘   └──────────┘   └─────┬──────┘   │
//!                        │                                     ▼          │
//!                        │  ┌──────────┐  ┌────────────┐  ┌──────────┐    │
//!                        │  │ metadata │─▶│ dispatcher │─▶│ forward  │────┼──▶ RPC server
//!                        │  │  bridge  │  │  (call)    │  │connection│    │
//!                        │  └──────────┘  └────────────┘  └──────────┘    │
//!   HTTP Response        │                      │                          │
//!   ◀────────────────────┼──────── encode ◀─────┘                          │
//!                        │                                                 │
//!                        │  config · observability · lifecycle             │
//!                        └────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use rpc_gateway::config::{load_config, GatewayConfig};
use rpc_gateway::lifecycle::{signals, startup, Shutdown};
use rpc_gateway::observability::{logging, metrics};
use rpc_gateway::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "rpc-gateway", version, about = "HTTP/JSON to RPC gateway")]
struct Args {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<SocketAddr>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind.to_string();
    }

    logging::init(&config.observability)?;

    tracing::info!("rpc-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let shutdown = Shutdown::new();
    let gateway = startup::build_gateway(&config, shutdown.clone()).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    signals::spawn_signal_handler(shutdown);

    let server = HttpServer::new(&gateway);
    server.run(listener).await?;

    gateway.shutdown().await;
    tracing::info!("Shutdown complete");
    Ok(())
}
