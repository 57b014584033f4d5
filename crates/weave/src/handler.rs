//! Per-connection handler: auth gate, socket setup, and the read loop.
//!
//! Each accepted upgrade gets its own task running this handler. The
//! flow is:
//!   1. Extract session id and token from the upgrade request
//!   2. Run the authentication predicate
//!   3. Rejected → record a status, drop the channel (no close
//!      handshake — the initiator sees an abnormal closure and polls)
//!   4. Admitted → create the socket, register it in the global room,
//!      run the application's setup callback, pump inbound frames
//!   5. On close → remove from every room, fire the disconnect handler

use std::sync::Arc;

use tokio::sync::mpsc;
use weave_protocol::SocketId;
use weave_socket::{HandlerMap, Socket};
use weave_transport::{UpgradeRequest, WsChannel};

use crate::AuthRequest;
use crate::Authenticator;
use crate::server::ServerState;

/// Drop guard tearing a connection out of the registry when the handler
/// exits — even if it panics. Room removal happens before the
/// application's disconnect handler runs.
struct ConnectionGuard<A: Authenticator> {
    id: SocketId,
    state: Arc<ServerState<A>>,
}

impl<A: Authenticator> Drop for ConnectionGuard<A> {
    fn drop(&mut self) {
        self.state.registry.remove(&self.id);
        if let Some(on_disconnect) = &self.state.on_disconnect {
            on_disconnect(self.id.clone());
        }
        tracing::info!(socket = %self.id, "connection closed");
    }
}

/// Handles a single connection from upgrade to close.
pub(crate) async fn drive_connection<A: Authenticator>(
    channel: WsChannel,
    request: UpgradeRequest,
    state: Arc<ServerState<A>>,
) {
    let session_id = request.session_id();
    let token = request.token();

    // --- Step 1: the authentication gate ---
    let auth_request = AuthRequest {
        headers: &request.headers,
        url: &request.url,
        token: token.as_deref(),
    };
    match state.auth.check(auth_request).await {
        Ok(true) => {}
        Ok(false) => {
            tracing::info!(
                session = session_id.as_deref().unwrap_or("-"),
                "upgrade rejected"
            );
            state.status.record(session_id.as_deref(), 401);
            // Dropping the channel here skips the close handshake on
            // purpose: the initiator must observe an abnormal closure.
            return;
        }
        Err(fault) => {
            tracing::warn!(
                session = session_id.as_deref().unwrap_or("-"),
                error = %fault,
                "auth predicate faulted"
            );
            state.status.record(session_id.as_deref(), 500);
            return;
        }
    }

    // --- Step 2: socket setup ---
    let (sink, mut source) = channel.split();
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(sink.pump(rx));

    let socket =
        Socket::new(SocketId::generate(), tx, HandlerMap::new(), state.logs);
    state.registry.insert(socket.clone());
    let _guard = ConnectionGuard {
        id: socket.id().clone(),
        state: Arc::clone(&state),
    };
    tracing::info!(socket = %socket.id(), "connection established");

    (state.on_connect)(socket.clone());

    // --- Step 3: the read loop ---
    loop {
        match source.recv().await {
            Ok(Some(text)) => socket.handle_frame(&text),
            Ok(None) => break,
            Err(e) => {
                tracing::debug!(
                    socket = %socket.id(),
                    error = %e,
                    "connection broke"
                );
                break;
            }
        }
    }

    // _guard drops here → registry removal + disconnect handler.
}
