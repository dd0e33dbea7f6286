//! Startup orchestration.
//!
//! # Responsibilities
//! - Build the gateway from validated configuration
//! - Bind the public and admin listeners
//! - Run both until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners bind last (traffic only when ready)

use std::net::SocketAddr;
use thiserror::Error;
use tokio::net::TcpListener;

use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::{signalled, Shutdown};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize gateway: {0}")]
    Init(#[from] GatewayError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}

/// Start the gateway and block until it has shut down.
pub async fn launch(config: GatewayConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    let admin = config.admin.clone();
    let server = HttpServer::new(config.clone())?;

    let listener = bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let admin_task = if admin.enabled {
        let admin_listener = bind(&admin.bind_address).await?;
        let app = setup_admin_router(server.state().clone());
        let stop = signalled(shutdown.subscribe());
        tracing::info!(address = %admin_listener.local_addr()?, "Admin API listening");
        Some(tokio::spawn(async move {
            axum::serve(admin_listener, app.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(stop)
                .await
        }))
    } else {
        None
    };

    server.run(listener, shutdown).await?;

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin server failed"),
            Err(e) => tracing::error!(error = %e, "Admin server task panicked"),
            Ok(Ok(())) => {}
        }
    }
    Ok(())
}
