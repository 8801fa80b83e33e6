// src/core/bridge.rs

//! The publish bridge: turns one HTTP publish request into a command message
//! and hands it to the registry.
//!
//! The HTTP status only reflects whether the frame was written to the
//! subscriber's transport, not what the subscriber did with it.

use super::errors::PushError;
use super::message::CommandMessage;
use super::metrics;
use super::registry::SessionRegistry;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

/// The static body returned for a successful submission.
pub const ACKNOWLEDGEMENT: &str = "OK";

const BEARER_PREFIX: &str = "Bearer ";

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The token is the text after the scheme prefix up to the next space. A
/// missing header, a different scheme, or an empty token are all
/// `Unauthorized`.
pub fn extract_bearer_token(header: Option<&str>) -> Result<&str, PushError> {
    let rest = header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .ok_or(PushError::Unauthorized)?;
    match rest.split(' ').next() {
        Some(token) if !token.is_empty() => Ok(token),
        _ => Err(PushError::Unauthorized),
    }
}

/// Publishes command messages on behalf of HTTP callers.
#[derive(Debug, Clone)]
pub struct PublishBridge {
    registry: Arc<SessionRegistry>,
}

impl PublishBridge {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Authenticates the caller by bearer token and publishes
    /// `{api, command, parameters}` to that token's session.
    ///
    /// An unknown token and a token whose session vanished before the write
    /// both come back as `Unauthorized`. At most one transport write happens,
    /// and only on the success path or a failed write.
    pub async fn submit<P>(
        &self,
        authorization: Option<&str>,
        api: &str,
        command: &str,
        parameters: P,
    ) -> Result<(), PushError>
    where
        P: IntoIterator<Item = (String, String)>,
    {
        let result = self.try_submit(authorization, api, command, parameters).await;
        let outcome = match &result {
            Ok(()) => "ok",
            Err(PushError::Unauthorized) => "unauthorized",
            Err(_) => "send_failed",
        };
        metrics::PUBLISH_TOTAL.with_label_values(&[outcome]).inc();
        result
    }

    /// Checks the caller's credential without publishing anything. Returns
    /// the bearer token when it names an active session.
    pub fn authorize<'a>(&self, authorization: Option<&'a str>) -> Result<&'a str, PushError> {
        let token = extract_bearer_token(authorization)?;
        if !self.registry.authenticate(token) {
            return Err(PushError::Unauthorized);
        }
        Ok(token)
    }

    /// Counts a rejection that happened before `submit` was reached.
    pub fn record_rejection(&self) {
        metrics::PUBLISH_TOTAL.with_label_values(&["unauthorized"]).inc();
    }

    async fn try_submit<P>(
        &self,
        authorization: Option<&str>,
        api: &str,
        command: &str,
        parameters: P,
    ) -> Result<(), PushError>
    where
        P: IntoIterator<Item = (String, String)>,
    {
        let token = self.authorize(authorization).inspect_err(|_| {
            debug!("Rejected publish {}/{}: unknown token.", api, command);
        })?;

        let message = CommandMessage::new(api, command, parameters);
        mask_vanished_session(self.registry.publish(token, &message).await)
    }
}

/// A session that went away between the credential check and the write is
/// reported the same way as an unknown token.
fn mask_vanished_session(result: Result<(), PushError>) -> Result<(), PushError> {
    match result {
        Err(PushError::NotConnected) => Err(PushError::Unauthorized),
        other => other,
    }
}

impl IntoResponse for PushError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            PushError::Unauthorized | PushError::NotConnected | PushError::EmptyToken => {
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
            PushError::AlreadyConnected(_) => (StatusCode::CONFLICT, self.to_string()),
            PushError::SendFailed(_)
            | PushError::TransportClosed
            | PushError::Transport(_)
            | PushError::Serialization(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to deliver message".to_string(),
            ),
        };
        (status, Json(json!({ "detail": detail }))).into_response()
    }
}
