// src/server/initialization.rs

//! Handles server initialization: the shared registry, the shutdown channel
//! and the public listener.

use super::context::ServerContext;
use crate::config::Config;
use crate::core::SessionRegistry;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::info;

/// Initializes all server components before starting the main loop.
pub async fn setup(config: Config) -> Result<ServerContext> {
    log_startup_info(&config);
    let (shutdown_tx, _) = broadcast::channel(1);

    let registry = Arc::new(SessionRegistry::new());
    info!("Session registry initialized.");

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr()))?;
    info!("PushBridge listening on {}", listener.local_addr()?);

    Ok(ServerContext {
        config,
        registry,
        listener,
        shutdown_tx,
        background_tasks: JoinSet::new(),
    })
}

fn log_startup_info(config: &Config) {
    info!(
        "Starting PushBridge v{} (keep-alive every {:?}, write timeout {}).",
        env!("CARGO_PKG_VERSION"),
        config.keepalive_interval,
        config
            .write_timeout
            .map_or_else(|| "disabled".to_string(), |t| format!("{t:?}"))
    );
}
