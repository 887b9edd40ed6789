use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{Router, routing::get};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::info;

use super::api::{self, AppState, SharedState};
use super::ws;
use crate::config::RelayConfig;

/// How many pending events the broadcast channel buffers per lagging
/// viewer before it starts dropping the oldest.
const EVENT_BUFFER: usize = 256;

/// Listener configuration for the relay server.
pub struct ServerConfig {
    pub port: u16,
    pub dev_mode: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            dev_mode: false,
        }
    }
}

/// Construct the shared state for a fresh relay process.
pub fn build_state(config: RelayConfig) -> SharedState {
    let (events_tx, _rx) = broadcast::channel::<String>(EVENT_BUFFER);
    Arc::new(AppState { config, events_tx })
}

/// Build the full application router: webhook + API surface plus the
/// viewer WebSocket endpoint.
pub fn build_router(state: SharedState) -> Router {
    api::api_router()
        .route("/ws", get(ws::ws_handler))
        .with_state(state)
}

/// Start the relay server and run until ctrl-c.
pub async fn start_server(config: RelayConfig, server: ServerConfig) -> Result<()> {
    let state = build_state(config);
    let mut app = build_router(state);

    if server.dev_mode {
        app = app.layer(CorsLayer::permissive());
    }

    let addr = format!("0.0.0.0:{}", server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind to {addr}"))?;

    let local_addr = listener.local_addr()?;
    info!(%local_addr, "relay listening");
    info!("press ctrl-c to terminate");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server shut down");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // No signal handler available; run until killed.
        std::future::pending::<()>().await;
    }
}
