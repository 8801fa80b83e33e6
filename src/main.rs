// src/main.rs

//! The main entry point for the PushBridge server application.

use anyhow::Result;
use pushbridge::config::Config;
use pushbridge::server;
use std::env;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Define version information.
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    // Handle the --version flag.
    if args.contains(&"--version".to_string()) {
        println!("PushBridge version {VERSION}");
        return Ok(());
    }

    // The config path can be provided via --config; otherwise "config.toml" is
    // used if present, and the built-in defaults if not.
    let explicit_path = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let mut config = match explicit_path {
        Some(path) => load_or_exit(path),
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_or_exit(DEFAULT_CONFIG_PATH),
        None => Config::default(),
    };

    // Override port if provided as a command-line argument
    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        if let Some(port_str) = args.get(port_index + 1) {
            match port_str.parse::<u16>() {
                Ok(port) if port != 0 => config.port = port,
                _ => {
                    eprintln!("Invalid port number: {port_str}");
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("--port flag requires a value");
            std::process::exit(1);
        }
    }
    if let Err(e) = config.validate() {
        eprintln!("Invalid configuration: {e}");
        std::process::exit(1);
    }

    // Get the log level from the env var or the config.
    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true), // Enable ANSI color codes for log levels.
        )
        .init();

    if explicit_path.is_none() && !Path::new(DEFAULT_CONFIG_PATH).exists() {
        info!("No {DEFAULT_CONFIG_PATH} found, using built-in defaults.");
    }

    if let Err(e) = server::run(config).await {
        error!("Server runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Loads the configuration or exits, since the server cannot run without a
/// valid one.
fn load_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{path}\": {e:#}");
            std::process::exit(1);
        }
    }
}
