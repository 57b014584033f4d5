//! The per-connection engine for Weave.
//!
//! A [`Socket`] wraps one message-framed duplex channel and provides the
//! event surface both sides of the protocol share:
//!
//! 1. **Emitting** — [`Socket::emit`] sends a named event with an ordered
//!    argument list; [`OutArg::Reply`] positions become pending acks.
//! 2. **Dispatch** — [`Socket::handle_frame`] decodes inbound text and
//!    routes it: ack frames resolve pending callbacks, event frames reach
//!    the registered handler with reply stubs rebuilt in place.
//! 3. **Handlers** — a [`HandlerMap`] from event name to handler, shared
//!    so the initiator can keep registrations alive across reconnects.
//!
//! # How it fits in the stack
//!
//! ```text
//! Room layer (above)   ← fans emit() out to many sockets
//!     ↕
//! Socket layer (this crate)  ← acks, handlers, dispatch
//!     ↕
//! Protocol layer (below)     ← frame shapes and the codec
//! ```

mod args;
mod error;
mod socket;

pub use args::{EventArg, EventHandler, HandlerMap, OutArg, ReplyFn, ReplyStub};
pub use error::SocketError;
pub use socket::Socket;
