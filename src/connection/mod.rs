// src/connection/mod.rs

//! Manages the lifecycle of a single subscriber connection: admission,
//! keep-alive supervision, disconnect detection and teardown.

mod guard;
mod handler;
mod session;

// Publicly re-export the primary types from the sub-modules.
pub use guard::{DisconnectReason, SessionGuard};
pub use handler::{DEFAULT_KEEPALIVE_INTERVAL, SessionDriver, serve_subscriber};
pub use session::{Session, SessionState};
