//! Chat payload types and their wire encoding
//!
//! Messages and roster snapshots travel as JSON. Typing notifications and
//! join/leave announcements carry the bare user name as UTF-8 bytes.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A single chat line
///
/// There is no identifier or timestamp: two identical payloads received from
/// the broker are two entries in the log.
///
/// # Examples
/// ```
/// use neochat::protocol::ChatMessage;
///
/// let message = ChatMessage::new("alice", "hi");
/// let json = serde_json::to_string(&message).unwrap();
/// assert_eq!(json, r#"{"sender":"alice","content":"hi"}"#);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub sender: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(sender: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            content: content.into(),
        }
    }
}

/// Inbound payload decoding failures
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("Expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

/// Decode a `ChatMessage` from a messages-topic payload
///
/// Only the object form is accepted. Unknown fields (the server echoes a
/// persisted `id`) are ignored.
pub fn decode_message(payload: &[u8]) -> Result<ChatMessage, DecodeError> {
    let value: serde_json::Value = serde_json::from_slice(payload)?;
    if !value.is_object() {
        return Err(DecodeError::NotAnObject(json_kind(&value)));
    }
    Ok(serde_json::from_value(value)?)
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}

/// Decode a roster snapshot: a JSON array of names, order preserved
pub fn decode_roster(payload: &[u8]) -> Result<Vec<String>, DecodeError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Decode a raw name (typing notifications)
pub fn decode_name(payload: &[u8]) -> Result<String, DecodeError> {
    Ok(std::str::from_utf8(payload)?.to_string())
}

/// Encode a chat message for the send destination
pub fn encode_message(message: &ChatMessage) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(message)
}
