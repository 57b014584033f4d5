//! Error types for the client.

use weave_socket::SocketError;

/// Errors that can occur on the initiator side.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The target is not a WebSocket URL. Reported synchronously at
    /// construction — the one fatal misconfiguration on this side.
    #[error("invalid url `{0}`: must start with ws:// or wss://")]
    InvalidUrl(String),

    /// No connection is currently open (still connecting, between
    /// reconnect attempts, or permanently closed).
    #[error("not connected")]
    NotConnected,

    /// Sending through the current connection failed.
    #[error(transparent)]
    Socket(#[from] SocketError),
}
