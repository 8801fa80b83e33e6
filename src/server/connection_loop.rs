// src/server/connection_loop.rs

//! Contains the main serve loop and the graceful shutdown sequence.

use super::context::ServerContext;
use super::routes::{AppState, build_router};
use anyhow::{Context, Result};
use std::future::IntoFuture;
use std::time::Duration;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{error, info, warn};

/// How long shutdown waits for the HTTP server and background tasks.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// Serves the public endpoints until a signal arrives or a background task
/// fails, then closes every session and stops the server.
pub async fn run(mut ctx: ServerContext) -> Result<()> {
    let mut sigint =
        signal(SignalKind::interrupt()).context("Failed to register SIGINT handler")?;
    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to register SIGTERM handler")?;

    let app = build_router(AppState::new(
        ctx.registry.clone(),
        &ctx.config,
        ctx.shutdown_tx.clone(),
    ));
    let mut server_shutdown_rx = ctx.shutdown_tx.subscribe();
    let mut server = tokio::spawn(
        axum::serve(ctx.listener, app)
            .with_graceful_shutdown(async move {
                server_shutdown_rx.recv().await.ok();
            })
            .into_future(),
    );
    let mut server_finished = false;

    loop {
        tokio::select! {
            biased;

            _ = sigint.recv() => {
                info!("SIGINT received, initiating graceful shutdown.");
                break;
            }
            _ = sigterm.recv() => {
                info!("SIGTERM received, initiating graceful shutdown.");
                break;
            }

            Some(res) = ctx.background_tasks.join_next() => {
                match res {
                    Ok(Ok(())) => warn!("A background task finished unexpectedly without an error."),
                    Ok(Err(e)) => { error!("CRITICAL: Background task failed: {}. Shutting down.", e); break; }
                    Err(e) => { error!("CRITICAL: Background task panicked: {e:?}. Shutting down."); break; }
                }
            },

            res = &mut server => {
                server_finished = true;
                match res {
                    Ok(Ok(())) => warn!("HTTP server stopped unexpectedly."),
                    Ok(Err(e)) => error!("CRITICAL: HTTP server failed: {}. Shutting down.", e),
                    Err(e) => error!("CRITICAL: HTTP server task panicked: {e:?}. Shutting down."),
                }
                break;
            }
        }
    }

    info!(
        "Shutting down. Closing {} session(s) and stopping all tasks.",
        ctx.registry.len()
    );
    if ctx.shutdown_tx.send(()).is_err() {
        warn!("No task was listening for the shutdown signal.");
    }
    ctx.registry.shutdown_all();

    if !server_finished
        && tokio::time::timeout(SHUTDOWN_GRACE, &mut server)
            .await
            .is_err()
    {
        warn!("Timed out waiting for the HTTP server to stop; aborting it.");
        server.abort();
    }

    info!("Waiting for background tasks to finish...");
    if tokio::time::timeout(SHUTDOWN_GRACE, async {
        while ctx.background_tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        warn!("Timed out waiting for background tasks to finish cleanly.");
    };
    info!("Server shutdown complete.");
    Ok(())
}
