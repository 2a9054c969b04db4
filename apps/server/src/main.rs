//! HTTP front end for the videogames assistant.
//!
//! Run with: cargo run -p videogames-assistant-server
//!
//! Serves `/health`, `/` and (optionally) `/dev-ui`, and forwards every
//! other request to the agent runtime at `AGENT_RUNTIME_URL`.

use std::net::SocketAddr;

use anyhow::Context;
use assistant_core::ServiceConfig;
use assistant_transport::{RuntimeProxy, create_router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = ServiceConfig::from_env()?;
    let proxy = RuntimeProxy::new(&config.runtime_url)?;
    let app = create_router(&config, proxy);

    tracing::info!(
        origins = ?config.allowed_origins,
        web_interface = config.serve_web_interface,
        runtime = %config.runtime_url,
        "Starting videogames assistant"
    );

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Server listening on http://{addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
