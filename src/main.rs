//! API gateway binary.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────┐
//!                    │                      GATEWAY                         │
//!  Client Request    │  ┌────────┐   ┌──────────┐   ┌────────────┐          │
//!  ──────────────────┼─▶│ server │──▶│ routing  │──▶│ rate limit │          │
//!                    │  └────────┘   └──────────┘   └─────┬──────┘          │
//!                    │                                    ▼                 │
//!                    │                 ┌──────────┐  ┌───────────┐          │
//!                    │                 │ tracing  │─▶│  circuit  │          │
//!                    │                 │ context  │  │  breaker  │          │
//!                    │                 └──────────┘  └─────┬─────┘          │
//!                    │                                     ▼                │
//!  Client Response   │  ┌──────────┐               ┌────────────┐           │
//!  ◀─────────────────┼──│ sanitize │◀──────────────│ forwarder  │◀──────────┼── Downstream
//!                    │  └──────────┘               └────────────┘           │
//!                    └──────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_gateway::config::{load_config, GatewayConfig};
use api_gateway::lifecycle::signals::spawn_signal_handler;
use api_gateway::observability::{logging, metrics};
use api_gateway::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "HTTP API gateway with rate limiting and circuit breaking", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long, env = "GATEWAY_BIND")]
    bind: Option<String>,

    /// Validate the configuration and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");

    if config.routes.is_empty() {
        tracing::warn!("No routes configured; every request will get 404");
    }
    for route in &config.routes {
        tracing::info!(
            route = %route.route_id,
            prefix = %route.path_prefix,
            downstream = %route.downstream_base_url,
            "Route configured"
        );
    }

    let server = HttpServer::new(config.clone())?;
    if cli.check {
        tracing::info!("Configuration is valid");
        return Ok(());
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    spawn_signal_handler(shutdown.clone());
    server.run(listener, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
