//! Transport layer for Weave.
//!
//! Wraps `tokio-tungstenite` into the small surface the rest of the stack
//! needs: a listener that yields message-framed duplex channels together
//! with the HTTP upgrade request that produced them, and a dialer for the
//! initiator side.
//!
//! The transport deals in whole text frames. Everything above it
//! (frame decoding, ack bookkeeping, rooms) never sees a raw stream.

mod error;
mod websocket;

pub use error::TransportError;
pub use websocket::{
    UpgradeRequest, WsChannel, WsListener, WsSink, WsSource, connect,
};

// Re-exported so upper layers can name header/URL types without depending
// on tungstenite or url directly.
pub use tokio_tungstenite::tungstenite::http::HeaderMap;
pub use url::Url;
