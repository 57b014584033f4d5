//! Error types for the protocol layer.
//!
//! Each crate in Weave defines its own error enum. A `ProtocolError`
//! always means a serialization problem, never a networking or room
//! management one.

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a frame into wire text).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed (turning wire text into a frame).
    ///
    /// Common causes: malformed JSON, a missing `evt`/`ack` field, or a
    /// `data` field that is not a sequence.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),
}
