//! Wire protocol for Weave.
//!
//! This crate defines the "language" that the two ends of a connection
//! speak:
//!
//! - **Types** ([`EventFrame`], [`AckFrame`], [`Frame`], [`SocketId`]) —
//!   the message structures that travel on the wire.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to/from text.
//! - **Errors** ([`ProtocolError`]) — what can go wrong during
//!   encoding/decoding.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (raw text frames) and the
//! connection engine (ack bookkeeping, handler dispatch). It doesn't know
//! about connections or rooms — it only knows how to serialize and
//! deserialize frames.
//!
//! ```text
//! Transport (text) → Protocol (Frame) → Socket (acks, handlers)
//! ```

mod codec;
mod error;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use types::{AckFrame, EventFrame, Frame, SocketId};
