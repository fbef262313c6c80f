//! WebSocket listener
//!
//! Serves the control and telemetry channels plus a health endpoint, and
//! spawns a handler for every upgraded connection.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use da_core::Channel;

use crate::server::handler::serve_connection;
use crate::state::{HealthReport, RelayState};

/// Endpoint of the control channel
pub const CONTROL_PATH: &str = "/ws/control/";

/// Endpoint of the telemetry channel
pub const TELEMETRY_PATH: &str = "/ws/pc_info/";

#[derive(Clone)]
struct ServerContext {
    state: Arc<RelayState>,
    cancel: CancellationToken,
}

/// Build the relay's HTTP router
pub fn router(state: Arc<RelayState>, cancel: CancellationToken) -> Router {
    Router::new()
        .route(CONTROL_PATH, get(control_ws))
        .route(CONTROL_PATH.trim_end_matches('/'), get(control_ws))
        .route(TELEMETRY_PATH, get(telemetry_ws))
        .route(TELEMETRY_PATH.trim_end_matches('/'), get(telemetry_ws))
        .route("/health", get(health))
        .with_state(ServerContext { state, cancel })
}

async fn control_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(ctx): State<ServerContext>,
) -> Response {
    upgrade(ws, Channel::Control, peer, ctx)
}

async fn telemetry_ws(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(ctx): State<ServerContext>,
) -> Response {
    upgrade(ws, Channel::Telemetry, peer, ctx)
}

fn upgrade(ws: WebSocketUpgrade, channel: Channel, peer: SocketAddr, ctx: ServerContext) -> Response {
    tracing::info!("New {} connection from {}", channel, peer);
    ws.on_upgrade(move |socket| serve_connection(socket, channel, Some(peer), ctx.state, ctx.cancel))
}

async fn health(State(ctx): State<ServerContext>) -> Json<HealthReport> {
    Json(ctx.state.health())
}

/// WebSocket server for the relay
pub struct RelayServer {
    /// Shared relay state
    state: Arc<RelayState>,
    /// Cancellation token for graceful shutdown
    cancel: CancellationToken,
}

impl RelayServer {
    /// Create a new relay server
    pub fn new(state: Arc<RelayState>, cancel: CancellationToken) -> Self {
        Self { state, cancel }
    }

    /// Bind to `bind_addr` and serve until cancelled
    pub async fn run(&self, bind_addr: &str) -> Result<()> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .with_context(|| format!("Failed to bind to {}", bind_addr))?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener until cancelled
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!("Relay listening on {}", local_addr);

        let app = router(Arc::clone(&self.state), self.cancel.clone());
        let cancel = self.cancel.clone();

        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .context("Relay server failed")?;

        tracing::info!("Relay server shut down");
        Ok(())
    }
}
