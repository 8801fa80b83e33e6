// src/core/errors.rs

//! Defines the primary error type for the entire application.

use thiserror::Error;

/// The main error enum, representing every failure the registry, the
/// lifecycle driver and the publish bridge can report.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PushError {
    /// Admission conflict: an active session already owns this token.
    #[error("Token {0} already connected")]
    AlreadyConnected(String),

    #[error("token must not be empty")]
    EmptyToken,

    /// Missing or malformed credential, or a token without an active session.
    /// Deliberately carries no detail so callers cannot enumerate tokens.
    #[error("Unauthorized")]
    Unauthorized,

    #[error("No active session for token")]
    NotConnected,

    /// The transport write for a publish failed or timed out.
    #[error("Failed to deliver message: {0}")]
    SendFailed(String),

    #[error("Transport already closed")]
    TransportClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for PushError {
    fn from(e: serde_json::Error) -> Self {
        PushError::Serialization(e.to_string())
    }
}

impl From<axum::Error> for PushError {
    fn from(e: axum::Error) -> Self {
        PushError::Transport(e.to_string())
    }
}

impl PushError {
    /// Collapses any transport-level failure into `SendFailed`, the only
    /// write error a publisher ever observes.
    pub fn into_send_failed(self) -> Self {
        match self {
            PushError::SendFailed(_) => self,
            other => PushError::SendFailed(other.to_string()),
        }
    }
}
