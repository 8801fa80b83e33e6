// src/server/metrics_server.rs

use crate::core::SessionRegistry;
use crate::core::metrics::{self, gather_metrics};
use anyhow::{Context, Result};
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Handles HTTP requests to the /metrics endpoint.
///
/// It refreshes the session gauge from the registry before gathering all
/// registered metrics and encoding them in the Prometheus text format.
async fn metrics_handler(registry: Arc<SessionRegistry>) -> impl IntoResponse {
    metrics::ACTIVE_SESSIONS.set(registry.len() as f64);

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Runs a simple HTTP server to expose Prometheus metrics on /metrics.
pub async fn run_metrics_server(
    registry: Arc<SessionRegistry>,
    addr: (String, u16),
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let app = Router::new().route("/metrics", get(move || metrics_handler(registry.clone())));

    let listener = tokio::net::TcpListener::bind((addr.0.as_str(), addr.1))
        .await
        .with_context(|| format!("Failed to bind metrics server on port {}", addr.1))?;
    info!(
        "Prometheus metrics server listening on http://{}/metrics",
        listener.local_addr()?
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Metrics server shutting down.");
        })
        .await
        .context("Metrics server failed")
}
