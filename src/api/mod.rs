//! Read-only HTTP view of the running simulation.
//!
//! - `/state`: the latest telemetry snapshot, `404` until the first tick completes
//! - `/health`: liveness and whether any telemetry exists yet

mod handlers;

use std::io;
use std::net::SocketAddr;

use axum::Router;
use axum::routing::get;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::telemetry::LatestSnapshot;

/// Builds the axum router over the latest-snapshot slot.
pub fn router(latest: LatestSnapshot) -> Router {
    Router::new()
        .route("/state", get(handlers::get_state))
        .route("/health", get(handlers::get_health))
        .with_state(latest)
}

/// Binds to `addr` and serves until `cancel` fires.
///
/// # Errors
///
/// Returns an `io::Error` if the listener cannot bind or the server fails.
pub async fn serve(
    latest: LatestSnapshot,
    addr: SocketAddr,
    cancel: CancellationToken,
) -> io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "API server listening");
    axum::serve(listener, router(latest))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
}
