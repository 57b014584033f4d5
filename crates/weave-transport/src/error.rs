//! Error types for the transport layer.

use tokio_tungstenite::tungstenite::Error as WsError;

/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target address is not a WebSocket URL.
    #[error("invalid url `{0}`: must start with ws:// or wss://")]
    InvalidUrl(String),

    /// Binding the listener or accepting a TCP connection failed.
    #[error("accept failed: {0}")]
    AcceptFailed(#[source] std::io::Error),

    /// The WebSocket upgrade handshake failed.
    #[error("handshake failed: {0}")]
    HandshakeFailed(#[source] WsError),

    /// The upgrade request could not be interpreted (bad host header,
    /// unparseable target).
    #[error("malformed upgrade request: {0}")]
    BadUpgrade(String),

    /// Dialing the remote endpoint failed.
    #[error("connect failed: {0}")]
    ConnectFailed(#[source] WsError),

    /// Sending a frame failed — the channel is gone.
    #[error("send failed: {0}")]
    SendFailed(#[source] WsError),

    /// The channel broke without a clean close handshake.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] WsError),
}
