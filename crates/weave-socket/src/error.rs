//! Error types for the socket layer.

use weave_protocol::ProtocolError;

/// Errors that can occur when sending through a socket.
///
/// Inbound problems (malformed frames, unknown events, stale acks) are
/// not errors — they drop the frame and keep the connection open.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    /// The outbound channel is gone — the connection was torn down.
    #[error("connection closed")]
    Closed,

    /// Encoding the outbound frame failed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}
