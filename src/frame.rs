//! Frame — the wire message type for drawroom.
//!
//! ARCHITECTURE
//! ============
//! Every websocket text message is one Frame: an event name plus a flat JSON
//! object payload. Clients send room events, the server dispatches on the
//! event name and fans resulting frames out to the room's connections.
//!
//! DESIGN
//! ======
//! - Flat data: payload is always `Map<String, Value>`, defaulting to `{}`.
//! - Draw payloads are carried through untouched; only the session layer
//!   reads the few fields it needs (`roomName`, `username`, `x`, `y`).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// =============================================================================
// EVENT NAMES
// =============================================================================

// Client → server.
pub const JOIN_ROOM: &str = "join-room";
pub const LEAVE_ROOM: &str = "leave-room";
pub const CURSOR_MOVE: &str = "cursor-move";

// Server → client.
pub const ROOM_JOINED: &str = "room-joined";
pub const USER_JOINED: &str = "user-joined";
pub const USERS_UPDATE: &str = "users-update";
pub const CURSOR_UPDATE: &str = "cursor-update";
pub const USER_LEFT: &str = "user-left";
pub const ERROR: &str = "error";

// Both directions.
pub const DRAW: &str = "draw";
pub const UNDO: &str = "undo";
pub const REDO: &str = "redo";
pub const CLEAR_CANVAS: &str = "clear-canvas";

// =============================================================================
// FIELD CONSTANTS
// =============================================================================

/// Frame data key for error messages.
pub const FRAME_MESSAGE: &str = "message";

/// Frame data key for grepable error codes.
pub const FRAME_CODE: &str = "code";

/// Frame data key for the retryable flag on error frames.
pub const FRAME_RETRYABLE: &str = "retryable";

// =============================================================================
// TYPES
// =============================================================================

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// The universal message type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub event: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub data: Data,
}

/// Clients send `"data": null` for payload-less events.
fn null_as_empty<'de, D>(deserializer: D) -> Result<Data, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Data>::deserialize(deserializer)?.unwrap_or_default())
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

impl Frame {
    /// Create a frame with an empty payload.
    pub fn new(event: impl Into<String>) -> Self {
        Self { event: event.into(), data: Data::new() }
    }

    /// Create a frame carrying an existing payload as-is.
    pub fn with_payload(event: impl Into<String>, data: Data) -> Self {
        Self { event: event.into(), data }
    }

    /// Create an `error` frame from a plain string.
    pub fn error(code: &str, message: impl Into<String>) -> Self {
        Self::new(ERROR)
            .with_data(FRAME_CODE, code)
            .with_data(FRAME_MESSAGE, message.into())
            .with_data(FRAME_RETRYABLE, false)
    }

    /// Create a structured `error` frame from a typed error.
    #[must_use]
    pub fn error_from(err: &(impl ErrorCode + ?Sized)) -> Self {
        Self::new(ERROR)
            .with_data(FRAME_CODE, err.error_code())
            .with_data(FRAME_MESSAGE, err.to_string())
            .with_data(FRAME_RETRYABLE, err.retryable())
    }
}

// =============================================================================
// BUILDERS / ACCESSORS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// String field from the payload, if present and a string.
    #[must_use]
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(serde_json::Value::as_str)
    }

    /// Numeric field from the payload, if present and a number.
    #[must_use]
    pub fn f64_field(&self, key: &str) -> Option<f64> {
        self.data.get(key).and_then(serde_json::Value::as_f64)
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
