//! Codec trait and the JSON implementation.
//!
//! A codec converts between Rust types and the textual wire encoding.
//! The protocol is textual by design (no binary payload framing), so
//! codecs produce and consume `String`/`&str` rather than byte buffers.

use serde::{Serialize, de::DeserializeOwned};

use crate::ProtocolError;

/// Encodes values to wire text and decodes wire text back.
///
/// `Send + Sync + 'static` because a codec is shared by every task that
/// touches a connection.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into its textual wire form.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError>;

    /// Deserializes wire text back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the text is malformed or
    /// doesn't match the expected shape. Callers treat this as a dropped
    /// frame, never as a connection-fatal fault.
    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError>;
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use weave_protocol::{Codec, EventFrame, JsonCodec};
///
/// let codec = JsonCodec;
/// let frame = EventFrame {
///     evt: "ping".into(),
///     data: vec![],
///     ack_indices: None,
/// };
///
/// let text = codec.encode(&frame).unwrap();
/// let decoded: EventFrame = codec.decode(&text).unwrap();
/// assert_eq!(frame, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, text: &str) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
