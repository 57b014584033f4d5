//! Unified error type for the Weave acceptor.

use weave_protocol::ProtocolError;
use weave_socket::SocketError;
use weave_transport::TransportError;

/// Top-level error that wraps the crate-specific errors.
///
/// When using the `weave` meta-crate you deal with this single type; the
/// `#[from]` attributes let `?` convert sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum WeaveError {
    /// A transport-level error (bind, accept, handshake).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A socket-level error (send on a torn-down connection).
    #[error(transparent)]
    Socket(#[from] SocketError),

    /// The server was constructed without the pieces it needs.
    /// Reported synchronously at build time.
    #[error("invalid configuration: {0}")]
    Config(String),
}
