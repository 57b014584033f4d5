//! # Weave
//!
//! Bidirectional event messaging over WebSockets: named events with
//! ordered argument lists, reply callbacks correlated across the wire,
//! broadcast rooms, and transparent reconnection on the initiator side.
//!
//! This crate is the acceptor side plus the umbrella re-exports. The
//! initiator lives in `weave-client`; the shared engine in
//! `weave-socket`.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use weave::prelude::*;
//!
//! # async fn demo() -> Result<(), WeaveError> {
//! let server = WeaveServerBuilder::new()
//!     .bind("127.0.0.1:8080")
//!     .on_connect(|socket| {
//!         socket.on("greet", |args| println!("greeted: {args:?}"));
//!     })
//!     .build(AcceptAll)
//!     .await?;
//! server.run().await
//! # }
//! ```

mod auth;
mod error;
mod handler;
mod server;
mod status;

pub use auth::{AcceptAll, AuthFault, AuthRequest, Authenticator};
pub use error::WeaveError;
pub use server::{WeaveServer, WeaveServerBuilder};
pub use status::{StatusReply, StatusTable};

/// Common imports for building a Weave server.
pub mod prelude {
    pub use crate::{
        AcceptAll, AuthRequest, Authenticator, StatusReply, StatusTable,
        WeaveError, WeaveServer, WeaveServerBuilder,
    };
    pub use weave_protocol::SocketId;
    pub use weave_room::RoomRegistry;
    pub use weave_socket::{EventArg, OutArg, Socket};
}
