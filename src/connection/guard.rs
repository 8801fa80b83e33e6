// src/connection/guard.rs

//! Defines `SessionGuard`, an RAII guard for session teardown.

use super::session::Session;
use crate::core::registry::SessionRegistry;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a session's driver stopped. Classified from the transport's own
/// signals, never from error message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The subscriber sent a close frame.
    ClosedByPeer,
    /// The inbound stream ended without a close frame.
    StreamEnded,
    /// Reading from the transport failed.
    TransportError(String),
    /// Writing the keep-alive frame failed.
    KeepAliveFailed(String),
    /// The session was removed from the registry by someone else.
    Evicted,
    /// The server is shutting down.
    Shutdown,
}

impl fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisconnectReason::ClosedByPeer => write!(f, "closed by peer"),
            DisconnectReason::StreamEnded => write!(f, "stream ended"),
            DisconnectReason::TransportError(e) => write!(f, "transport error: {e}"),
            DisconnectReason::KeepAliveFailed(e) => write!(f, "keep-alive failed: {e}"),
            DisconnectReason::Evicted => write!(f, "removed from registry"),
            DisconnectReason::Shutdown => write!(f, "server shutdown"),
        }
    }
}

/// Guarantees that a session is torn down exactly once when its driver's
/// scope is exited, whether normally, by early return or by panic.
pub struct SessionGuard {
    registry: Arc<SessionRegistry>,
    session: Arc<Session>,
    reason: Option<DisconnectReason>,
}

impl SessionGuard {
    pub(crate) fn new(registry: Arc<SessionRegistry>, session: Arc<Session>) -> Self {
        Self {
            registry,
            session,
            reason: None,
        }
    }

    /// Records why the session is ending, for the teardown log line.
    pub(crate) fn set_reason(&mut self, reason: DisconnectReason) {
        self.reason = Some(reason);
    }
}

impl Drop for SessionGuard {
    /// Moves the session through `Closing` to `Closed` and unregisters it.
    fn drop(&mut self) {
        // May already be closing if another path got there first.
        self.session.begin_closing();

        if !self.registry.remove_session(&self.session) {
            debug!(
                "Session {} for token '{}' was no longer registered at teardown.",
                self.session.id, self.session.token
            );
        }
        self.session.mark_closed();

        let reason = self
            .reason
            .as_ref()
            .map_or_else(|| "driver aborted".to_string(), ToString::to_string);
        info!(
            "Disconnected client with token: '{}' (session {}, {}).",
            self.session.token, self.session.id, reason
        );
    }
}
