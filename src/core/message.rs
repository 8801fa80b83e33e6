// src/core/message.rs

//! The command message forwarded from an HTTP publisher to a subscriber.

use super::errors::PushError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The literal frame emitted whenever a session's idle window elapses.
/// Subscribers must skip frames equal to this value.
pub const KEEP_ALIVE_FRAME: &str = "keep_alive";

/// A `{api, command, parameters}` payload. The registry treats it as opaque;
/// validating `parameters` is the subscriber's job.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CommandMessage {
    pub api: String,
    pub command: String,
    /// Query parameters, string-typed and kept sorted so the serialized
    /// frame is stable and easy to read in logs.
    pub parameters: BTreeMap<String, String>,
}

impl CommandMessage {
    pub fn new(
        api: impl Into<String>,
        command: impl Into<String>,
        parameters: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        Self {
            api: api.into(),
            command: command.into(),
            parameters: parameters.into_iter().collect(),
        }
    }

    /// Serializes the message into the single text frame sent to the subscriber.
    pub fn to_frame(&self) -> Result<String, PushError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parses a frame received by a subscriber. Returns `Ok(None)` for keep-alive frames.
    pub fn from_frame(frame: &str) -> Result<Option<Self>, PushError> {
        if frame == KEEP_ALIVE_FRAME {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(frame)?))
    }
}
