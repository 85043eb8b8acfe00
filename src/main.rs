//! Research Hub server.

use std::net::SocketAddr;

use research_hub::{app, config, db, AppState, Error, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "research_hub=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::init();
    tracing::info!(
        "Starting Research Hub on {}:{}",
        config.server.host,
        config.server.port
    );

    if config.auth.providers.is_empty() {
        tracing::warn!("No auth providers configured; sign-in is unavailable");
    }

    // Initialize application state
    let state = AppState::new().await?;
    tracing::info!("Application state initialized");

    let removed = db::cleanup_expired(&state.db).await?;
    if removed > 0 {
        tracing::info!(removed, "Removed expired sessions and sign-in states");
    }

    let app = app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| Error::Internal(format!("Invalid listen address: {}", e)))?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
