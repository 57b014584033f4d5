//! The room registry: membership sets plus the global room.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use weave_protocol::SocketId;
use weave_socket::{OutArg, Socket};

/// Tracks which connection is in which room and fans events out to them.
///
/// Cheap to clone — a handle over shared state. All mutation happens
/// under registry-level locks held only for map operations; delivery runs
/// on a membership snapshot, so a member mid-removal never sees a
/// duplicate or missing broadcast within one `emit` call.
#[derive(Clone, Default)]
pub struct RoomRegistry {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    /// Named rooms. A room with zero members is removed; re-creating the
    /// same name later starts empty.
    rooms: Mutex<HashMap<String, HashSet<SocketId>>>,

    /// Every live connection — this is the global room.
    members: Mutex<HashMap<SocketId, Socket>>,
}

impl RoomRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// Registers a connection in the global room.
    pub fn insert(&self, socket: Socket) {
        let id = socket.id().clone();
        self.shared.members.lock().insert(id.clone(), socket);
        tracing::debug!(socket = %id, "connection registered");
    }

    /// Removes a connection from the global room and from every room it
    /// joined, pruning rooms that become empty.
    ///
    /// Called on transport close, before the connection object is
    /// discarded — after this, no room holds a reference to it.
    pub fn remove(&self, id: &SocketId) -> Option<Socket> {
        self.shared.rooms.lock().retain(|_, members| {
            members.remove(id);
            !members.is_empty()
        });
        let socket = self.shared.members.lock().remove(id);
        if socket.is_some() {
            tracing::debug!(socket = %id, "connection removed");
        }
        socket
    }

    // -----------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------

    /// Adds a connection to a room. Idempotent — joining twice is the
    /// same as joining once.
    pub fn join(&self, room: &str, id: &SocketId) {
        self.shared
            .rooms
            .lock()
            .entry(room.to_string())
            .or_default()
            .insert(id.clone());
    }

    /// Removes a connection from a room. Leaving a room one is not a
    /// member of is a no-op; a room left empty is removed.
    pub fn leave(&self, room: &str, id: &SocketId) {
        let mut rooms = self.shared.rooms.lock();
        if let Some(members) = rooms.get_mut(room) {
            members.remove(id);
            if members.is_empty() {
                rooms.remove(room);
            }
        }
    }

    // -----------------------------------------------------------------
    // Fan-out
    // -----------------------------------------------------------------

    /// Emits an event to every current member of `room`.
    ///
    /// Each member's emit allocates its own ack ids. Delivery order
    /// across members is unspecified, and one closed member never
    /// prevents delivery to the rest. Returns how many members the event
    /// reached; an unknown room reaches nobody.
    pub fn emit(&self, room: &str, event: &str, args: Vec<OutArg>) -> usize {
        let targets = self.room_snapshot(room, None);
        deliver(&targets, event, args)
    }

    /// Like [`emit`](Self::emit), skipping exactly `origin`.
    pub fn emit_excluding(
        &self,
        room: &str,
        origin: &SocketId,
        event: &str,
        args: Vec<OutArg>,
    ) -> usize {
        let targets = self.room_snapshot(room, Some(origin));
        deliver(&targets, event, args)
    }

    /// Emits an event to every connection on the server (the global room).
    pub fn broadcast(&self, event: &str, args: Vec<OutArg>) -> usize {
        let targets = self.global_snapshot(None);
        deliver(&targets, event, args)
    }

    /// Like [`broadcast`](Self::broadcast), skipping exactly `origin`.
    pub fn broadcast_excluding(
        &self,
        origin: &SocketId,
        event: &str,
        args: Vec<OutArg>,
    ) -> usize {
        let targets = self.global_snapshot(Some(origin));
        deliver(&targets, event, args)
    }

    // -----------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------

    /// Names of all rooms that currently have members.
    pub fn rooms(&self) -> Vec<String> {
        self.shared.rooms.lock().keys().cloned().collect()
    }

    /// Number of members in `room` (0 for an unknown room).
    pub fn room_size(&self, room: &str) -> usize {
        self.shared
            .rooms
            .lock()
            .get(room)
            .map_or(0, HashSet::len)
    }

    /// Returns `true` if `id` is a member of `room`.
    pub fn contains(&self, room: &str, id: &SocketId) -> bool {
        self.shared
            .rooms
            .lock()
            .get(room)
            .is_some_and(|members| members.contains(id))
    }

    /// All rooms `id` is a member of.
    pub fn rooms_of(&self, id: &SocketId) -> Vec<String> {
        self.shared
            .rooms
            .lock()
            .iter()
            .filter(|(_, members)| members.contains(id))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// The member ids of `room`.
    pub fn members_of(&self, room: &str) -> Vec<SocketId> {
        self.shared
            .rooms
            .lock()
            .get(room)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Looks up a live connection by id.
    pub fn get(&self, id: &SocketId) -> Option<Socket> {
        self.shared.members.lock().get(id).cloned()
    }

    /// Number of live connections (global room size).
    pub fn connection_count(&self) -> usize {
        self.shared.members.lock().len()
    }

    /// Returns `true` if no connection is registered.
    pub fn is_empty(&self) -> bool {
        self.shared.members.lock().is_empty()
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    /// Snapshots the sockets of a room's members, minus `exclude`.
    fn room_snapshot(
        &self,
        room: &str,
        exclude: Option<&SocketId>,
    ) -> Vec<Socket> {
        let ids: Vec<SocketId> = match self.shared.rooms.lock().get(room) {
            Some(members) => members
                .iter()
                .filter(|id| Some(*id) != exclude)
                .cloned()
                .collect(),
            None => return Vec::new(),
        };
        let members = self.shared.members.lock();
        ids.iter().filter_map(|id| members.get(id).cloned()).collect()
    }

    /// Snapshots every live socket, minus `exclude`.
    fn global_snapshot(&self, exclude: Option<&SocketId>) -> Vec<Socket> {
        self.shared
            .members
            .lock()
            .values()
            .filter(|socket| Some(socket.id()) != exclude)
            .cloned()
            .collect()
    }
}

/// Emits to each snapshot member, counting successes. A member whose
/// channel already closed is skipped without affecting the others.
fn deliver(targets: &[Socket], event: &str, args: Vec<OutArg>) -> usize {
    let mut delivered = 0;
    for socket in targets {
        match socket.emit(event, args.clone()) {
            Ok(()) => delivered += 1,
            Err(e) => {
                tracing::debug!(
                    socket = %socket.id(),
                    error = %e,
                    "skipping undeliverable member"
                );
            }
        }
    }
    delivered
}
