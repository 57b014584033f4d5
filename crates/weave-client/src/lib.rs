//! Initiator-side connection management for Weave.
//!
//! This crate handles the lifecycle of an outbound connection:
//!
//! 1. **Connecting** — per-attempt session identifiers, token and id
//!    query parameters on the target address.
//! 2. **Reconnection** — a scheduled single retry after a configurable
//!    delay, looping while enabled ([`ClientConfig`]).
//! 3. **Failure diagnosis** — after an abnormal closure, a one-shot
//!    status lookup ([`StatusProbe`]) distinguishes authentication
//!    rejections from ordinary network failures.
//!
//! The state machine:
//!
//! ```text
//!   Connecting ──→ Open ──→ Closed(clean) ──(reconnect on)──→ Connecting
//!       │                       │
//!       └──────→ Closed(abnormal) ──(status found)──→ notified, stopped
//!                        │
//!                        └──(no status, reconnect on)──→ Connecting
//! ```

mod client;
mod config;
mod error;
mod status;

pub use client::{Client, ClientBuilder};
pub use config::ClientConfig;
pub use error::ClientError;
pub use status::{NoProbe, StatusProbe};
