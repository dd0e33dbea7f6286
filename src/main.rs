//! API Gateway
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────────┐
//!                  │                      API GATEWAY                        │
//!   Client         │  ┌──────────┐   ┌──────────┐   ┌──────────────────┐    │
//!   ───────────────┼─▶│ identity │──▶│   rate   │──▶│ routing: first   │    │
//!                  │  │          │   │  limiter │   │ path segment     │    │
//!                  │  └──────────┘   └────┬─────┘   └────────┬─────────┘    │
//!                  │                      │ counters         ▼              │
//!                  │                 ┌────▼─────┐   ┌──────────────────┐    │     Backend
//!                  │                 │  redis / │   │ proxy forwarder  │────┼───▶ services
//!                  │                 │  memory  │   │ (retry, backoff) │    │
//!                  │                 └──────────┘   └────────┬─────────┘    │
//!                  │                                         │ get/status   │
//!                  │  ┌─────────────────┐           ┌────────▼─────────┐    │
//!                  │  │ health monitor  │──update──▶│ service registry │    │
//!                  │  │ (periodic tick) │           │   (RwLock map)   │    │
//!                  │  └─────────────────┘           └──────────────────┘    │
//!                  └────────────────────────────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;

use api_gateway::config::load_config;
use api_gateway::lifecycle::{launch, wait_for_signal, Shutdown};
use api_gateway::observability::init_logging;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "API gateway with health-gated forwarding and rate limiting", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "CONFIG_PATH", default_value = "config/gateway.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;
    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        bind_address = %config.listener.bind_address,
        services = config.services.len(),
        "api-gateway starting"
    );

    let shutdown = Shutdown::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        wait_for_signal().await;
        trigger.trigger();
    });

    launch(config, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
