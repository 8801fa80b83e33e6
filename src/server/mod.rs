// src/server/mod.rs

use crate::config::Config;
use anyhow::Result;

mod connection_loop;
mod context;
mod initialization;
mod metrics_server;
mod routes;
mod spawner;

pub use routes::{AppState, build_router};

/// The main server startup function, orchestrating all setup phases.
pub async fn run(config: Config) -> Result<()> {
    // 1. Create the registry, the shutdown channel and bind the listener.
    let mut server_context = initialization::setup(config).await?;

    // 2. Spawn all background tasks.
    spawner::spawn_all(&mut server_context).await?;

    // 3. Serve until shutdown.
    connection_loop::run(server_context).await
}
