// src/core/transport.rs

//! The outbound half of a subscriber transport.
//!
//! The registry and the lifecycle driver only ever see a `FrameSink`, which
//! keeps them independent of the concrete WebSocket type and lets tests swap
//! in an in-memory sink.

use super::errors::PushError;
use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message};
use futures::{Sink, SinkExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// WebSocket close reasons must fit in a 125 byte control frame payload
/// (two bytes are taken by the status code).
pub const CLOSE_REASON_LIMIT: usize = 123;

/// A shared, type-erased handle to a session's outbound transport.
pub type SharedSink = Arc<dyn FrameSink>;

/// Writes frames to one subscriber. Implementations must be safe to call from
/// several tasks at once; writes are not ordered between concurrent callers.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Writes one text frame.
    async fn send_text(&self, text: String) -> Result<(), PushError>;

    /// Writes a close frame. Any later write fails with `TransportClosed`.
    async fn close(&self, code: u16, reason: &str) -> Result<(), PushError>;
}

/// A `FrameSink` over any `Sink<Message>`, normally the write half of a split
/// axum `WebSocket`. The sink sits behind an async mutex so the keep-alive
/// pulse and publishers can share it.
pub struct WebSocketSink<S> {
    inner: Mutex<S>,
    write_timeout: Option<Duration>,
    closed: AtomicBool,
}

impl<S> WebSocketSink<S>
where
    S: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    pub fn new(sink: S, write_timeout: Option<Duration>) -> Self {
        Self {
            inner: Mutex::new(sink),
            write_timeout,
            closed: AtomicBool::new(false),
        }
    }

    async fn write(&self, message: Message) -> Result<(), PushError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(PushError::TransportClosed);
        }
        let mut sink = self.inner.lock().await;
        let result = match self.write_timeout {
            Some(limit) => match tokio::time::timeout(limit, sink.send(message)).await {
                Ok(sent) => sent.map_err(PushError::from),
                Err(_) => Err(PushError::SendFailed(format!(
                    "write timed out after {limit:?}"
                ))),
            },
            None => sink.send(message).await.map_err(PushError::from),
        };
        // A failed write leaves the socket in an unknown state; treat it as gone.
        if result.is_err() {
            self.closed.store(true, Ordering::Release);
        }
        result
    }
}

#[async_trait]
impl<S> FrameSink for WebSocketSink<S>
where
    S: Sink<Message, Error = axum::Error> + Unpin + Send,
{
    async fn send_text(&self, text: String) -> Result<(), PushError> {
        self.write(Message::Text(text.into())).await
    }

    async fn close(&self, code: u16, reason: &str) -> Result<(), PushError> {
        let frame = CloseFrame {
            code,
            reason: truncate_reason(reason).into(),
        };
        let result = self.write(Message::Close(Some(frame))).await;
        self.closed.store(true, Ordering::Release);
        result
    }
}

/// Cuts a close reason down to `CLOSE_REASON_LIMIT` bytes on a char boundary.
pub fn truncate_reason(reason: &str) -> String {
    if reason.len() <= CLOSE_REASON_LIMIT {
        return reason.to_string();
    }
    let mut end = CLOSE_REASON_LIMIT;
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    reason[..end].to_string()
}
