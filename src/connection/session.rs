// src/connection/session.rs

//! Defines the state associated with a single subscriber session.

use crate::core::PushError;
use crate::core::transport::SharedSink;
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Instant;
use tokio::sync::broadcast;

/// The lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SessionState {
    Active = 0,
    Closing = 1,
    Closed = 2,
}

impl SessionState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SessionState::Active,
            1 => SessionState::Closing,
            _ => SessionState::Closed,
        }
    }
}

/// One live, token-identified subscriber connection.
///
/// Created only by `SessionRegistry::admit`. The token and id never change;
/// the state only moves forward (`Active -> Closing -> Closed`).
pub struct Session {
    /// Process-unique id, used to make teardown identity-checked.
    pub id: u64,
    pub token: String,
    pub connected_at: Instant,
    transport: SharedSink,
    state: AtomicU8,
    last_activity: Mutex<Instant>,
    /// Fired when the session is removed from outside its own driver.
    kill_tx: broadcast::Sender<()>,
    /// Subscribed at construction so a kill sent before the driver starts
    /// is still buffered for it.
    kill_rx: Mutex<Option<broadcast::Receiver<()>>>,
}

impl Session {
    pub(crate) fn new(id: u64, token: String, transport: SharedSink) -> Self {
        let (kill_tx, kill_rx) = broadcast::channel(1);
        let now = Instant::now();
        Self {
            id,
            token,
            connected_at: now,
            transport,
            state: AtomicU8::new(SessionState::Active as u8),
            last_activity: Mutex::new(now),
            kill_tx,
            kill_rx: Mutex::new(Some(kill_rx)),
        }
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_active(&self) -> bool {
        self.state() == SessionState::Active
    }

    /// Moves `Active -> Closing`. Returns `true` only for the caller that won
    /// the transition.
    pub fn begin_closing(&self) -> bool {
        self.state
            .compare_exchange(
                SessionState::Active as u8,
                SessionState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }

    pub(crate) fn mark_closed(&self) {
        self.state
            .store(SessionState::Closed as u8, Ordering::Release);
    }

    pub fn last_activity(&self) -> Instant {
        *self.last_activity.lock()
    }

    pub fn touch(&self) {
        *self.last_activity.lock() = Instant::now();
    }

    /// Subscribes to the kill switch. Only kills sent after this call are seen.
    pub fn kill_signal(&self) -> broadcast::Receiver<()> {
        self.kill_tx.subscribe()
    }

    /// Hands out the receiver created with the session, which has seen every
    /// kill since admission. Later callers get a fresh subscription.
    pub(crate) fn take_kill_signal(&self) -> broadcast::Receiver<()> {
        self.kill_rx
            .lock()
            .take()
            .unwrap_or_else(|| self.kill_tx.subscribe())
    }

    /// Asks the session's driver to stop. A no-op if nothing listens.
    pub fn kill(&self) {
        let _ = self.kill_tx.send(());
    }

    /// Writes a text frame to the subscriber and refreshes `last_activity`.
    pub async fn send_text(&self, text: String) -> Result<(), PushError> {
        self.transport.send_text(text).await?;
        self.touch();
        Ok(())
    }

    pub async fn close(&self, code: u16, reason: &str) -> Result<(), PushError> {
        self.transport.close(code, reason).await
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("token", &self.token)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
