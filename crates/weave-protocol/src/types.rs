//! Core wire types for Weave's frame format.
//!
//! Every message on the wire is one of two JSON shapes, distinguished by
//! which field is present:
//!
//! ```text
//! Event: { "evt": "<name>", "data": [..]?, "ackI": [..]? }
//! Ack:   { "ack": <id>, "data": [..] }
//! ```
//!
//! The `ack` field is the discriminant: a frame carrying it is an ack
//! frame no matter what else it carries.

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

// ---------------------------------------------------------------------------
// SocketId
// ---------------------------------------------------------------------------

/// Opaque identifier for one connection.
///
/// Stable for the lifetime of one underlying channel; the initiator derives
/// a fresh one per connect attempt and carries it as the `id` query
/// parameter, so a failed upgrade can later be matched to a status record.
///
/// `#[serde(transparent)]` keeps it a plain JSON string on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(String);

impl SocketId {
    /// Generates a random 32-character hex identifier (128 bits).
    ///
    /// Enough entropy that collisions between concurrent connections are
    /// not a practical concern.
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let bytes: [u8; 16] = rng.random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SocketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SocketId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// EventFrame
// ---------------------------------------------------------------------------

/// A named event with an ordered argument list.
///
/// `data` is omitted on the wire when the argument list is empty, and
/// `ackI` is omitted when no argument position carries an ack id. On the
/// sending side every position listed in `ackI` holds a freshly allocated
/// ack id (a positive integer); the receiver rebuilds a one-shot reply
/// stub at each of those positions before dispatching to the handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFrame {
    /// Event name the receiver dispatches on.
    pub evt: String,

    /// Positionally ordered arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub data: Vec<Value>,

    /// Positions in `data` that carry ack ids, ascending.
    #[serde(rename = "ackI", default, skip_serializing_if = "Option::is_none")]
    pub ack_indices: Option<Vec<usize>>,
}

// ---------------------------------------------------------------------------
// AckFrame
// ---------------------------------------------------------------------------

/// A reply to an event that carried ack ids.
///
/// Sent by the side that received the event, once per invoked reply stub.
/// `data` is always present, possibly empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AckFrame {
    /// The ack id captured from the originating event's payload.
    pub ack: u64,

    /// Arguments for the pending callback, positionally ordered.
    #[serde(default)]
    pub data: Vec<Value>,
}

// ---------------------------------------------------------------------------
// Frame
// ---------------------------------------------------------------------------

/// Any inbound frame: ack or event.
///
/// Untagged, with `Ack` tried first — presence of the `ack` field decides,
/// regardless of any other fields in the object. A frame that parses as
/// neither (no `ack`, no `evt`, or `data` not a sequence) is a decode
/// error, which callers treat as a dropped frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Ack(AckFrame),
    Event(EventFrame),
}

// =========================================================================
// Tests
// =========================================================================
