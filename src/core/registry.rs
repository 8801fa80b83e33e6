// src/core/registry.rs

//! The session registry: at most one active session per token.
//!
//! The registry is an explicitly owned component. It is built once at
//! startup and shared through an `Arc` by the subscriber endpoint and the
//! publish bridge; tests are free to create as many as they like.

use super::errors::PushError;
use super::message::CommandMessage;
use super::metrics;
use super::transport::SharedSink;
use crate::connection::Session;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Maps tokens to their live session. `DashMap` shards the map, so every
/// operation on one token is serialized by that token's shard lock.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Session>>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Admits a new session for `token`.
    ///
    /// Fails with `AlreadyConnected` if an active session already owns the
    /// token; the existing session is left untouched. A session that is
    /// already closing does not block admission.
    pub fn admit(&self, token: &str, transport: SharedSink) -> Result<Arc<Session>, PushError> {
        if token.is_empty() {
            return Err(PushError::EmptyToken);
        }

        match self.sessions.entry(token.to_string()) {
            Entry::Occupied(entry) if entry.get().is_active() => {
                metrics::SESSIONS_REJECTED_TOTAL.inc();
                Err(PushError::AlreadyConnected(token.to_string()))
            }
            Entry::Occupied(mut entry) => {
                let session = Arc::new(Session::new(self.allocate_id(), token.to_string(), transport));
                let stale = entry.insert(session.clone());
                debug!(
                    "Token '{}' re-admitted while session {} was still closing.",
                    token, stale.id
                );
                metrics::SESSIONS_ADMITTED_TOTAL.inc();
                Ok(session)
            }
            Entry::Vacant(entry) => {
                let session = Arc::new(Session::new(self.allocate_id(), token.to_string(), transport));
                entry.insert(session.clone());
                metrics::SESSIONS_ADMITTED_TOTAL.inc();
                metrics::ACTIVE_SESSIONS.inc();
                Ok(session)
            }
        }
    }

    /// Removes whatever session is stored under `token`, moves it to
    /// `Closing` and tells its driver to stop. Idempotent.
    pub fn remove(&self, token: &str) -> Option<Arc<Session>> {
        let (_, session) = self.sessions.remove(token)?;
        metrics::ACTIVE_SESSIONS.dec();
        session.begin_closing();
        session.kill();
        info!("Removed session {} for token '{}'.", session.id, token);
        Some(session)
    }

    /// Removes `session` only if it is still the one registered under its
    /// token. Used by a session's own teardown, so a late teardown never
    /// evicts a newer session for the same token.
    pub fn remove_session(&self, session: &Session) -> bool {
        let removed = self
            .sessions
            .remove_if(&session.token, |_, stored| stored.id == session.id)
            .is_some();
        if removed {
            metrics::ACTIVE_SESSIONS.dec();
        }
        removed
    }

    /// True iff `token` currently has an active session.
    pub fn authenticate(&self, token: &str) -> bool {
        self.sessions
            .get(token)
            .is_some_and(|session| session.is_active())
    }

    /// Returns the active session for `token`, if any.
    pub fn get(&self, token: &str) -> Option<Arc<Session>> {
        self.sessions
            .get(token)
            .filter(|session| session.is_active())
            .map(|session| session.value().clone())
    }

    /// Delivers `message` to the session addressed by `token`.
    ///
    /// Exactly one transport write is attempted when a session exists. The
    /// shard lock is released before the write, so a slow subscriber never
    /// blocks admission or publishes to other tokens.
    pub async fn publish(&self, token: &str, message: &CommandMessage) -> Result<(), PushError> {
        let session = self.get(token).ok_or(PushError::NotConnected)?;
        let frame = message.to_frame()?;

        match session.send_text(frame).await {
            Ok(()) => {
                debug!(
                    "Delivered {}/{} to session {} ('{}').",
                    message.api, message.command, session.id, token
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    "Failed to deliver {}/{} to session {} ('{}'): {}",
                    message.api, message.command, session.id, token, e
                );
                Err(e.into_send_failed())
            }
        }
    }

    /// Signals every session's driver to stop. Drivers remove themselves.
    pub fn shutdown_all(&self) {
        for entry in self.sessions.iter() {
            entry.value().kill();
        }
    }

    pub fn tokens(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn allocate_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}
