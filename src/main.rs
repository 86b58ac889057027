//! Edge gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                    EDGE GATEWAY                      │
//!                    │                                                      │
//!  Client Request    │  ┌──────────┐   ┌────────────┐   ┌──────────────┐    │
//!  ──────────────────┼─▶│  server  │──▶│ access log │──▶│  admission   │    │
//!                    │  │ (axum)   │   │            │   │ gate + limit │    │
//!                    │  └──────────┘   └────────────┘   └──────┬───────┘    │
//!                    │                                         ▼            │
//!                    │  ┌──────────┐   ┌────────────┐   ┌──────────────┐    │
//!  Client Response   │  │forwarder │◀──│ directory  │◀──│   routing    │    │
//!  ◀─────────────────┼──│ (hyper)  │   │static/reg. │   │longest prefix│    │
//!                    │  └────┬─────┘   └────────────┘   └──────────────┘    │
//!                    └───────┼──────────────────────────────────────────────┘
//!                            ▼
//!                         Backend
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use edge_gateway::config::{resolve_config, watcher::ConfigWatcher};
use edge_gateway::lifecycle::{signals::spawn_signal_handler, Shutdown};
use edge_gateway::observability::{init_logging, metrics::serve_metrics, MetricsSink, NoopSink, PrometheusSink};
use edge_gateway::GatewayServer;

#[derive(Parser)]
#[command(name = "edge-gateway")]
#[command(about = "HTTP edge gateway with prefix routing and rate limiting", long_about = None)]
struct Args {
    /// TOML configuration file. Defaults plus environment are used when absent.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(args.config.as_deref())?;

    init_logging(&config.observability.log_level);
    tracing::info!("edge-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        routes = config.routes.len(),
        rate_limit = config.rate_limit.capacity,
        window_ms = config.rate_limit.window_ms,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());

    let sink: Arc<dyn MetricsSink> = if config.observability.metrics_enabled {
        let prometheus = Arc::new(PrometheusSink::new()?);
        let metrics_listener = TcpListener::bind(&config.observability.metrics_address).await?;
        let rx = shutdown.subscribe();
        let exporter = prometheus.clone();
        tokio::spawn(async move {
            if let Err(e) = serve_metrics(metrics_listener, exporter, rx).await {
                tracing::error!(error = %e, "Metrics endpoint failed");
            }
        });
        prometheus
    } else {
        Arc::new(NoopSink)
    };

    // The watcher handle must outlive the server.
    let (_watcher, config_updates) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_tx, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = GatewayServer::new(config, sink)?;
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
