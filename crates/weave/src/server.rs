//! `WeaveServer` builder and accept loop.
//!
//! Ties the layers together: transport → auth gate → socket → rooms.

use std::sync::Arc;
use std::time::Duration;

use weave_protocol::SocketId;
use weave_room::RoomRegistry;
use weave_socket::Socket;
use weave_transport::WsListener;

use crate::handler::drive_connection;
use crate::{Authenticator, StatusTable, WeaveError};

/// Interval at which expired status records are swept.
const STATUS_SWEEP_INTERVAL: Duration = Duration::from_secs(1);

/// Shared server state passed to each connection handler task.
pub(crate) struct ServerState<A: Authenticator> {
    pub(crate) registry: RoomRegistry,
    pub(crate) status: StatusTable,
    pub(crate) auth: A,
    pub(crate) logs: bool,
    pub(crate) on_connect: Box<dyn Fn(Socket) + Send + Sync>,
    pub(crate) on_disconnect: Option<Box<dyn Fn(SocketId) + Send + Sync>>,
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Builder for configuring and starting a [`WeaveServer`].
///
/// A bind address is the one required piece; building without it fails
/// with [`WeaveError::Config`].
pub struct WeaveServerBuilder {
    bind_addr: Option<String>,
    logs: bool,
    status_ttl: Duration,
    registry: RoomRegistry,
    on_connect: Box<dyn Fn(Socket) + Send + Sync>,
    on_disconnect: Option<Box<dyn Fn(SocketId) + Send + Sync>>,
}

impl WeaveServerBuilder {
    /// Creates a builder with default settings (and no acceptor yet).
    pub fn new() -> Self {
        Self {
            bind_addr: None,
            logs: false,
            status_ttl: StatusTable::DEFAULT_TTL,
            registry: RoomRegistry::new(),
            on_connect: Box::new(|_| {}),
            on_disconnect: None,
        }
    }

    /// Sets the address to accept connections on. Required.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = Some(addr.to_string());
        self
    }

    /// Enables per-frame diagnostic logging on accepted sockets.
    pub fn logs(mut self, logs: bool) -> Self {
        self.logs = logs;
        self
    }

    /// Overrides how long rejection status records stay readable.
    pub fn status_ttl(mut self, ttl: Duration) -> Self {
        self.status_ttl = ttl;
        self
    }

    /// Supplies the room registry the server should use.
    ///
    /// Defaults to a fresh one. Injecting it up front lets the
    /// per-connection setup callback capture a handle to the same
    /// registry the server registers connections in.
    pub fn registry(mut self, registry: RoomRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Per-connection setup callback, invoked once for every accepted
    /// connection with its freshly created socket. Register handlers and
    /// join rooms here.
    pub fn on_connect<F>(mut self, callback: F) -> Self
    where
        F: Fn(Socket) + Send + Sync + 'static,
    {
        self.on_connect = Box::new(callback);
        self
    }

    /// Disconnect handler, invoked after a connection has been removed
    /// from every room.
    pub fn on_disconnect<F>(mut self, callback: F) -> Self
    where
        F: Fn(SocketId) + Send + Sync + 'static,
    {
        self.on_disconnect = Some(Box::new(callback));
        self
    }

    /// Binds the listener and assembles the server.
    ///
    /// # Errors
    /// Returns [`WeaveError::Config`] when no bind address was supplied,
    /// or a transport error when binding fails.
    pub async fn build<A: Authenticator>(
        self,
        auth: A,
    ) -> Result<WeaveServer<A>, WeaveError> {
        let addr = self.bind_addr.ok_or_else(|| {
            WeaveError::Config("no acceptor address provided".into())
        })?;
        let listener = WsListener::bind(&addr).await?;

        let state = Arc::new(ServerState {
            registry: self.registry,
            status: StatusTable::new(self.status_ttl),
            auth,
            logs: self.logs,
            on_connect: self.on_connect,
            on_disconnect: self.on_disconnect,
        });

        Ok(WeaveServer { listener, state })
    }
}

impl Default for WeaveServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// A running Weave acceptor.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct WeaveServer<A: Authenticator> {
    listener: WsListener,
    state: Arc<ServerState<A>>,
}

impl<A: Authenticator> WeaveServer<A> {
    /// Creates a new builder.
    pub fn builder() -> WeaveServerBuilder {
        WeaveServerBuilder::new()
    }

    /// The room registry — created with this server, torn down with it.
    pub fn registry(&self) -> RoomRegistry {
        self.state.registry.clone()
    }

    /// The status table backing the status-poll endpoint.
    pub fn status(&self) -> StatusTable {
        self.state.status.clone()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the accept loop.
    ///
    /// Each accepted upgrade goes through the auth gate and, when
    /// admitted, gets its own handler task. Also drives the periodic
    /// sweep of expired status records. Runs until the process ends.
    pub async fn run(mut self) -> Result<(), WeaveError> {
        tracing::info!("weave server running");

        let status = self.state.status.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(STATUS_SWEEP_INTERVAL);
            loop {
                ticker.tick().await;
                let swept = status.expire_stale();
                if swept > 0 {
                    tracing::debug!(swept, "expired status records");
                }
            }
        });

        loop {
            match self.listener.accept().await {
                Ok((channel, request)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        drive_connection(channel, request, state).await;
                    });
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
