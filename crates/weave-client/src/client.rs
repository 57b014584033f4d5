//! The client: builder, handle, and the connection driver task.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time;
use weave_protocol::SocketId;
use weave_socket::{EventArg, HandlerMap, OutArg, Socket};
use weave_transport::WsSource;

use crate::{ClientConfig, ClientError, StatusProbe};

/// How one connection attempt ended.
enum Closure {
    /// Clean close handshake completed.
    Clean,
    /// The channel broke, or the handshake itself failed.
    Abnormal,
    /// The client was disposed locally.
    Shutdown,
}

/// Lifecycle notification callbacks.
#[derive(Clone, Default)]
struct Hooks {
    connect: Option<Arc<dyn Fn(Socket) + Send + Sync>>,
    disconnect: Option<Arc<dyn Fn() + Send + Sync>>,
    unauthorized: Option<Arc<dyn Fn() + Send + Sync>>,
    forbidden: Option<Arc<dyn Fn() + Send + Sync>>,
    server_error: Option<Arc<dyn Fn() + Send + Sync>>,
}

#[derive(Default)]
struct SharedState {
    /// The socket of the currently open attempt, if any.
    current: Mutex<Option<Socket>>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a [`Client`].
///
/// # Example
///
/// ```rust,no_run
/// use weave_client::{ClientBuilder, NoProbe};
///
/// # async fn demo() -> Result<(), weave_client::ClientError> {
/// let client = ClientBuilder::new()
///     .token("secret")
///     .on("news", |args| println!("news: {args:?}"))
///     .connect("ws://127.0.0.1:8080/link", NoProbe)?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct ClientBuilder {
    config: ClientConfig,
    handlers: HandlerMap,
    hooks: Hooks,
}

impl ClientBuilder {
    /// Creates a builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Enables or disables reconnection (default: enabled).
    pub fn reconnect(mut self, reconnect: bool) -> Self {
        self.config.reconnect = reconnect;
        self
    }

    /// Sets the delay before a scheduled reconnection attempt.
    pub fn reconnect_interval(mut self, interval: std::time::Duration) -> Self {
        self.config.reconnect_interval = interval;
        self
    }

    /// Enables per-frame diagnostic logging.
    pub fn logs(mut self, logs: bool) -> Self {
        self.config.logs = logs;
        self
    }

    /// Sets the credential sent as the `token` query parameter.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = Some(token.into());
        self
    }

    /// Registers an event handler — survives reconnects, last wins.
    pub fn on<F>(self, event: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Vec<EventArg>) + Send + Sync + 'static,
    {
        self.handlers.on(event, handler);
        self
    }

    /// Called each time a connection opens (including reconnects).
    pub fn on_connect<F>(mut self, hook: F) -> Self
    where
        F: Fn(Socket) + Send + Sync + 'static,
    {
        self.hooks.connect = Some(Arc::new(hook));
        self
    }

    /// Called each time a connection closes, before any reconnect.
    pub fn on_disconnect<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.disconnect = Some(Arc::new(hook));
        self
    }

    /// Called when a failed attempt turns out to be a 401 rejection.
    pub fn on_unauthorized<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.unauthorized = Some(Arc::new(hook));
        self
    }

    /// Called when a failed attempt turns out to be a 403 rejection.
    pub fn on_forbidden<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.forbidden = Some(Arc::new(hook));
        self
    }

    /// Called when a failed attempt turns out to be a server-side fault.
    pub fn on_server_error<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.hooks.server_error = Some(Arc::new(hook));
        self
    }

    /// Validates the target and spawns the connection driver.
    ///
    /// Must be called within a Tokio runtime. `probe` answers the
    /// one-shot status lookup after an abnormal closure; use
    /// [`NoProbe`](crate::NoProbe) when there is no status channel.
    ///
    /// # Errors
    /// Returns [`ClientError::InvalidUrl`] unless the target starts with
    /// `ws://` or `wss://`.
    pub fn connect<P: StatusProbe>(
        self,
        url: impl Into<String>,
        probe: P,
    ) -> Result<Client, ClientError> {
        let url = url.into();
        if !url.starts_with("ws://") && !url.starts_with("wss://") {
            return Err(ClientError::InvalidUrl(url));
        }

        let shared = Arc::new(SharedState::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = tokio::spawn(run_driver(
            url,
            self.config,
            self.hooks,
            self.handlers.clone(),
            Arc::clone(&shared),
            probe,
            shutdown_rx,
        ));

        Ok(Client {
            shared,
            handlers: self.handlers,
            shutdown: shutdown_tx,
            driver,
        })
    }
}

// ---------------------------------------------------------------------------
// Client handle
// ---------------------------------------------------------------------------

/// Handle to a running client.
///
/// Dropping the handle disposes the connection: any scheduled reconnect
/// is cancelled and the driver task stops.
pub struct Client {
    shared: Arc<SharedState>,
    handlers: HandlerMap,
    shutdown: watch::Sender<bool>,
    driver: JoinHandle<()>,
}

impl Client {
    /// Emits an event over the current connection.
    ///
    /// # Errors
    /// Returns [`ClientError::NotConnected`] while no connection is open.
    pub fn emit(
        &self,
        event: &str,
        args: Vec<OutArg>,
    ) -> Result<(), ClientError> {
        let socket = self
            .shared
            .current
            .lock()
            .clone()
            .ok_or(ClientError::NotConnected)?;
        socket.emit(event, args)?;
        Ok(())
    }

    /// Registers an event handler — survives reconnects, last wins.
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Vec<EventArg>) + Send + Sync + 'static,
    {
        self.handlers.on(event, handler);
    }

    /// Returns `true` while a connection is open.
    pub fn is_connected(&self) -> bool {
        self.shared
            .current
            .lock()
            .as_ref()
            .is_some_and(Socket::is_open)
    }

    /// The session identifier of the current attempt, if connected.
    pub fn session_id(&self) -> Option<SocketId> {
        self.shared
            .current
            .lock()
            .as_ref()
            .map(|socket| socket.id().clone())
    }

    /// Disposes the client: cancels any scheduled reconnect and closes
    /// the current connection. No notification fires beyond the ordinary
    /// disconnect one.
    pub fn close(&self) {
        let _ = self.shutdown.send(true);
    }

    /// Waits for the driver task to finish.
    pub async fn closed(self) {
        let _ = self.driver.await;
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Appends the credential and per-attempt session id to the base target.
fn build_target(
    base: &str,
    token: Option<&str>,
    session_id: &SocketId,
) -> String {
    let mut target = base.to_string();
    if let Some(token) = token {
        target.push(if target.contains('?') { '&' } else { '?' });
        target.push_str("token=");
        target.push_str(token);
    }
    target.push(if target.contains('?') { '&' } else { '?' });
    target.push_str("id=");
    target.push_str(session_id.as_str());
    target
}

/// The connection loop: one attempt per iteration, at most one scheduled
/// retry pending at any time.
async fn run_driver<P: StatusProbe>(
    base_url: String,
    config: ClientConfig,
    hooks: Hooks,
    handlers: HandlerMap,
    shared: Arc<SharedState>,
    probe: P,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        // Fresh identity per attempt, carried as the `id` parameter so a
        // failed upgrade can be matched to a status record afterwards.
        let session_id = SocketId::generate();
        let target =
            build_target(&base_url, config.token.as_deref(), &session_id);

        let closure = match weave_transport::connect(&target).await {
            Ok(channel) => {
                let (sink, mut source) = channel.split();
                let (tx, rx) = mpsc::unbounded_channel();
                tokio::spawn(sink.pump(rx));

                let socket = Socket::new(
                    session_id.clone(),
                    tx,
                    handlers.clone(),
                    config.logs,
                );
                *shared.current.lock() = Some(socket.clone());
                tracing::info!(session = %session_id, "connected");
                if let Some(hook) = &hooks.connect {
                    hook(socket.clone());
                }

                let closure =
                    read_loop(&mut source, &socket, &mut shutdown).await;

                *shared.current.lock() = None;
                tracing::info!(session = %session_id, "disconnected");
                if let Some(hook) = &hooks.disconnect {
                    hook();
                }
                closure
            }
            Err(e) => {
                tracing::debug!(
                    session = %session_id,
                    error = %e,
                    "connect attempt failed"
                );
                Closure::Abnormal
            }
        };

        match closure {
            Closure::Shutdown => break,
            Closure::Clean => {}
            Closure::Abnormal => {
                // One-shot lookup: a recorded status explains the failure
                // and replaces reconnection with a distinct notification.
                if let Some(code) = probe.lookup(session_id.as_str()).await {
                    tracing::info!(
                        session = %session_id,
                        code,
                        "upgrade was rejected"
                    );
                    match code {
                        401 => fire(&hooks.unauthorized),
                        403 => fire(&hooks.forbidden),
                        500 => fire(&hooks.server_error),
                        other => tracing::warn!(
                            code = other,
                            "unexpected status code"
                        ),
                    }
                    break;
                }
            }
        }

        if !config.reconnect {
            break;
        }
        tokio::select! {
            _ = time::sleep(config.reconnect_interval) => {}
            _ = shutdown.changed() => break,
        }
    }
    tracing::debug!("client driver stopped");
}

/// Feeds inbound frames into the socket until the connection ends or the
/// client is disposed.
async fn read_loop(
    source: &mut WsSource,
    socket: &Socket,
    shutdown: &mut watch::Receiver<bool>,
) -> Closure {
    loop {
        tokio::select! {
            result = source.recv() => match result {
                Ok(Some(text)) => socket.handle_frame(&text),
                Ok(None) => return Closure::Clean,
                Err(e) => {
                    tracing::debug!(error = %e, "connection broke");
                    return Closure::Abnormal;
                }
            },
            _ = shutdown.changed() => return Closure::Shutdown,
        }
    }
}

fn fire(hook: &Option<Arc<dyn Fn() + Send + Sync>>) {
    if let Some(hook) = hook {
        hook();
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // =====================================================================
    // build_target()
    // =====================================================================

    #[test]
    fn test_build_target_appends_id_as_first_param() {
        let id = SocketId::from("s1");
        assert_eq!(
            build_target("ws://host/link", None, &id),
            "ws://host/link?id=s1"
        );
    }

    #[test]
    fn test_build_target_token_then_id() {
        let id = SocketId::from("s1");
        assert_eq!(
            build_target("ws://host/link", Some("secret"), &id),
            "ws://host/link?token=secret&id=s1"
        );
    }

    #[test]
    fn test_build_target_respects_existing_query() {
        let id = SocketId::from("s1");
        assert_eq!(
            build_target("ws://host/link?v=2", Some("t"), &id),
            "ws://host/link?v=2&token=t&id=s1"
        );
    }

    // =====================================================================
    // ClientBuilder::connect()
    // =====================================================================

    #[tokio::test]
    async fn test_connect_rejects_non_websocket_url() {
        let result = ClientBuilder::new()
            .connect("http://host/link", crate::NoProbe);
        assert!(matches!(result, Err(ClientError::InvalidUrl(_))));
    }
}
