//! WebSocket channels via `tokio-tungstenite`.

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{
    Request, Response,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use url::Url;

use crate::TransportError;

/// Both the accepted and the dialed side resolve to the same stream type;
/// the listener wraps its plain TCP streams in [`MaybeTlsStream::Plain`].
type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ---------------------------------------------------------------------------
// UpgradeRequest
// ---------------------------------------------------------------------------

/// The HTTP request that initiated a WebSocket upgrade.
///
/// Captured during the handshake and handed to the acceptor alongside the
/// channel, so the authentication gate can inspect headers and query
/// parameters before any frame is exchanged.
#[derive(Debug, Clone)]
pub struct UpgradeRequest {
    /// Request headers as sent by the initiator.
    pub headers: crate::HeaderMap,

    /// The request target resolved against the `Host` header.
    pub url: Url,
}

impl UpgradeRequest {
    /// Returns the first query parameter named `name`, percent-decoded.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.into_owned())
    }

    /// The initiator-supplied session identifier (`id` parameter).
    pub fn session_id(&self) -> Option<String> {
        self.query_param("id")
    }

    /// The credential token (`token` parameter), when one was sent.
    pub fn token(&self) -> Option<String> {
        self.query_param("token")
    }
}

// ---------------------------------------------------------------------------
// Listener
// ---------------------------------------------------------------------------

/// Accepts incoming WebSocket connections.
pub struct WsListener {
    listener: TcpListener,
}

impl WsListener {
    /// Binds a listener to the given address.
    ///
    /// # Errors
    /// Returns [`TransportError::AcceptFailed`] if the address cannot be
    /// bound.
    pub async fn bind(addr: &str) -> Result<Self, TransportError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(TransportError::AcceptFailed)?;
        tracing::info!(addr, "listening for connections");
        Ok(Self { listener })
    }

    /// Returns the local address the listener is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits for the next connection and completes its WebSocket upgrade.
    ///
    /// Returns the channel together with the captured upgrade request.
    /// The caller decides what to do with the pair — an authentication
    /// gate that rejects the request simply drops the channel, which the
    /// initiator observes as an abnormal closure.
    ///
    /// # Errors
    /// Returns an error when the TCP accept or the upgrade handshake
    /// fails; the listener itself stays usable.
    pub async fn accept(
        &mut self,
    ) -> Result<(WsChannel, UpgradeRequest), TransportError> {
        let (stream, peer) = self
            .listener
            .accept()
            .await
            .map_err(TransportError::AcceptFailed)?;

        let mut captured: Option<(crate::HeaderMap, String)> = None;
        let ws = tokio_tungstenite::accept_hdr_async(
            MaybeTlsStream::Plain(stream),
            |request: &Request, response: Response| {
                captured = Some((
                    request.headers().clone(),
                    request.uri().to_string(),
                ));
                Ok(response)
            },
        )
        .await
        .map_err(TransportError::HandshakeFailed)?;

        let (headers, target) = captured.ok_or_else(|| {
            TransportError::BadUpgrade("no request captured".into())
        })?;
        let url = resolve_target(&headers, &target)?;

        tracing::debug!(%peer, %url, "accepted connection");
        Ok((WsChannel { ws }, UpgradeRequest { headers, url }))
    }
}

/// Resolves a request target (usually path-and-query) against the `Host`
/// header into an absolute URL.
fn resolve_target(
    headers: &crate::HeaderMap,
    target: &str,
) -> Result<Url, TransportError> {
    if let Ok(url) = Url::parse(target) {
        return Ok(url);
    }
    let host = headers
        .get("host")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    Url::parse(&format!("ws://{host}{target}"))
        .map_err(|e| TransportError::BadUpgrade(e.to_string()))
}

// ---------------------------------------------------------------------------
// Dialer
// ---------------------------------------------------------------------------

/// Dials a WebSocket endpoint.
///
/// # Errors
/// Returns [`TransportError::InvalidUrl`] for non-WebSocket schemes and
/// [`TransportError::ConnectFailed`] when the dial or upgrade fails.
pub async fn connect(url: &str) -> Result<WsChannel, TransportError> {
    if !url.starts_with("ws://") && !url.starts_with("wss://") {
        return Err(TransportError::InvalidUrl(url.to_string()));
    }
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .map_err(TransportError::ConnectFailed)?;
    tracing::debug!(url, "connected");
    Ok(WsChannel { ws })
}

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// A connected, message-framed duplex channel.
pub struct WsChannel {
    ws: WsStream,
}

impl WsChannel {
    /// Splits the channel into independent send and receive halves, so one
    /// task can pump outbound frames while another drives inbound ones.
    pub fn split(self) -> (WsSink, WsSource) {
        let (sink, stream) = self.ws.split();
        (WsSink { sink }, WsSource { stream })
    }
}

/// The outbound half of a channel.
pub struct WsSink {
    sink: SplitSink<WsStream, Message>,
}

impl WsSink {
    /// Sends one text frame.
    ///
    /// # Errors
    /// Returns [`TransportError::SendFailed`] when the channel is gone.
    pub async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.sink
            .send(Message::Text(text.into()))
            .await
            .map_err(TransportError::SendFailed)
    }

    /// Initiates the clean close handshake.
    pub async fn close(&mut self) -> Result<(), TransportError> {
        self.sink.close().await.map_err(TransportError::SendFailed)
    }

    /// Drains a frame queue into the channel until the queue closes, then
    /// performs the clean close handshake.
    ///
    /// Both sides run this as their writer task: application code only
    /// ever pushes into the queue, so caller send order is preserved onto
    /// the transport.
    pub async fn pump(
        mut self,
        mut frames: tokio::sync::mpsc::UnboundedReceiver<String>,
    ) {
        while let Some(text) = frames.recv().await {
            if let Err(e) = self.send(text).await {
                tracing::debug!(error = %e, "writer stopping");
                return;
            }
        }
        let _ = self.close().await;
    }
}

/// The inbound half of a channel.
pub struct WsSource {
    stream: SplitStream<WsStream>,
}

impl WsSource {
    /// Receives the next text frame.
    ///
    /// Returns `Ok(None)` on a clean close and `Err` when the channel
    /// broke without one; the distinction drives the initiator's
    /// reconnect-versus-status-lookup decision. Ping/pong and binary
    /// frames are skipped — the protocol is textual.
    ///
    /// # Errors
    /// Returns [`TransportError::ReceiveFailed`] on abnormal termination.
    pub async fn recv(&mut self) -> Result<Option<String>, TransportError> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return Ok(Some(text.as_str().to_owned()));
                }
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(e));
                }
            }
        }
    }
}
