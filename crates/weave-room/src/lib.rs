//! Room membership and broadcast for Weave.
//!
//! A room groups connections for fan-out so a publisher never enumerates
//! connections itself. Membership is not exclusive — a connection can be
//! in any number of rooms at once — and every accepted connection also
//! lives in an implicit global room used for server-wide broadcast.
//!
//! # Key types
//!
//! - [`RoomRegistry`] — owns all room state; created with the server,
//!   dropped with it. Never a process-wide singleton.

mod registry;

pub use registry::RoomRegistry;
