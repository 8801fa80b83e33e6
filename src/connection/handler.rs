// src/connection/handler.rs

//! Defines the `SessionDriver` which supervises one admitted subscriber
//! connection from admission until teardown.

use super::guard::{DisconnectReason, SessionGuard};
use super::session::Session;
use crate::core::PushError;
use crate::core::message::KEEP_ALIVE_FRAME;
use crate::core::metrics;
use crate::core::registry::SessionRegistry;
use crate::core::transport::SharedSink;
use axum::extract::ws::{Message, close_code};
use futures::{Stream, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// The default idle window after which a keep-alive frame is sent.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// Admits a subscriber and drives its session until it disconnects.
///
/// A duplicate or empty token is answered with a policy-violation close frame
/// naming the problem, and the admission error is returned. The existing
/// session for the token is not affected.
pub async fn serve_subscriber<I>(
    token: &str,
    transport: SharedSink,
    inbound: I,
    registry: Arc<SessionRegistry>,
    keepalive_interval: Duration,
    shutdown_rx: broadcast::Receiver<()>,
) -> Result<DisconnectReason, PushError>
where
    I: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    let session = match registry.admit(token, transport.clone()) {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejecting connection for token '{}': {}", token, e);
            if let Err(close_err) = transport.close(close_code::POLICY, &e.to_string()).await {
                debug!("Could not send rejection close frame: {}", close_err);
            }
            return Err(e);
        }
    };
    info!(
        "Connected to client with token: '{}' (session {}).",
        token, session.id
    );

    let driver = SessionDriver::new(session, registry, inbound, keepalive_interval, shutdown_rx);
    Ok(driver.run().await)
}

/// Supervises one session: reads inbound frames, emits keep-alives when the
/// connection goes idle, and tears the session down on the first
/// disconnect signal.
pub struct SessionDriver<I> {
    session: Arc<Session>,
    registry: Arc<SessionRegistry>,
    inbound: I,
    keepalive_interval: Duration,
    shutdown_rx: broadcast::Receiver<()>,
}

impl<I> SessionDriver<I>
where
    I: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
{
    pub fn new(
        session: Arc<Session>,
        registry: Arc<SessionRegistry>,
        inbound: I,
        keepalive_interval: Duration,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            session,
            registry,
            inbound,
            keepalive_interval,
            shutdown_rx,
        }
    }

    /// The main loop for the session. Returns once the session is closed and
    /// unregistered.
    pub async fn run(mut self) -> DisconnectReason {
        let mut guard = SessionGuard::new(self.registry.clone(), self.session.clone());
        let mut kill_rx = self.session.take_kill_signal();

        let reason = loop {
            // Removed before the driver started, or between two waits.
            if !self.session.is_active() {
                let _ = self.session.close(close_code::NORMAL, "session removed").await;
                break DisconnectReason::Evicted;
            }

            tokio::select! {
                // Prioritize shutdown signals over other events.
                biased;
                _ = self.shutdown_rx.recv() => {
                    let _ = self.session.close(close_code::AWAY, "server shutting down").await;
                    break DisconnectReason::Shutdown;
                }
                _ = kill_rx.recv() => {
                    let _ = self.session.close(close_code::NORMAL, "session removed").await;
                    break DisconnectReason::Evicted;
                }
                next = tokio::time::timeout(self.keepalive_interval, self.inbound.next()) => {
                    match next {
                        // Inbound content is never interpreted, only counted as activity.
                        Ok(Some(Ok(Message::Close(_)))) => break DisconnectReason::ClosedByPeer,
                        Ok(Some(Ok(_))) => self.session.touch(),
                        Ok(Some(Err(e))) => break DisconnectReason::TransportError(e.to_string()),
                        Ok(None) => break DisconnectReason::StreamEnded,
                        Err(_) => {
                            if let Err(e) = self.session.send_text(KEEP_ALIVE_FRAME.to_string()).await {
                                break DisconnectReason::KeepAliveFailed(e.to_string());
                            }
                            metrics::KEEPALIVES_SENT_TOTAL.inc();
                            debug!("Sent keep-alive to session {} ('{}').", self.session.id, self.session.token);
                        }
                    }
                }
            }
        };

        self.session.begin_closing();
        guard.set_reason(reason.clone());
        reason
    }
}
