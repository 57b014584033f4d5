//! Argument types for emitting and receiving events.
//!
//! An argument is either a plain JSON value or a reply position — decided
//! explicitly by the caller, never inferred from a runtime type check.
//! This makes ack-index computation a pure structural scan of the
//! argument list.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use weave_protocol::{AckFrame, Codec, JsonCodec};

use crate::SocketError;

/// A callback awaiting the remote side's ack for one emitted event.
///
/// `Arc` so a single callback can back a broadcast: each member's emit
/// allocates its own ack id pointing at the same function. Consumption is
/// still at-most-once *per ack id* — the pending entry is removed before
/// the callback runs.
pub type ReplyFn = Arc<dyn Fn(Vec<Value>) + Send + Sync>;

/// A registered event handler.
pub type EventHandler = Arc<dyn Fn(Vec<EventArg>) + Send + Sync>;

// ---------------------------------------------------------------------------
// OutArg — outbound arguments
// ---------------------------------------------------------------------------

/// One outbound argument: a value, or a callback expecting a reply.
#[derive(Clone)]
pub enum OutArg {
    /// Ordinary data, transmitted as-is.
    Value(Value),

    /// A reply position. Replaced on the wire by a freshly allocated ack
    /// id; the callback runs when the matching ack frame arrives.
    Reply(ReplyFn),
}

impl OutArg {
    /// Wraps a callback as a reply argument.
    pub fn reply<F>(callback: F) -> Self
    where
        F: Fn(Vec<Value>) + Send + Sync + 'static,
    {
        Self::Reply(Arc::new(callback))
    }
}

impl From<Value> for OutArg {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl fmt::Debug for OutArg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Self::Reply(_) => f.debug_tuple("Reply").finish(),
        }
    }
}

// ---------------------------------------------------------------------------
// EventArg — inbound arguments
// ---------------------------------------------------------------------------

/// One inbound argument as seen by a handler: a value, or a rebuilt
/// reply stub for a position the sender marked in `ackI`.
#[derive(Debug)]
pub enum EventArg {
    /// Ordinary data.
    Value(Value),

    /// A one-shot handle that sends the ack back over the connection.
    Reply(ReplyStub),
}

impl EventArg {
    /// Returns the inner value for a data argument.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Self::Value(v) => Some(v),
            Self::Reply(_) => None,
        }
    }

    /// Extracts the reply stub, consuming the argument.
    pub fn into_reply(self) -> Option<ReplyStub> {
        match self {
            Self::Reply(stub) => Some(stub),
            Self::Value(_) => None,
        }
    }
}

// ---------------------------------------------------------------------------
// ReplyStub
// ---------------------------------------------------------------------------

/// A one-shot remote-procedure stub reconstructed at an ack position.
///
/// Invoking it encodes `{ack: <captured id>, data: <args>}` and sends it
/// back over the connection the event arrived on. One-shot by move:
/// [`send`](Self::send) consumes the stub.
pub struct ReplyStub {
    ack_id: u64,
    outbound: mpsc::UnboundedSender<String>,
}

impl ReplyStub {
    pub(crate) fn new(
        ack_id: u64,
        outbound: mpsc::UnboundedSender<String>,
    ) -> Self {
        Self { ack_id, outbound }
    }

    /// The ack id captured from the event payload.
    pub fn ack_id(&self) -> u64 {
        self.ack_id
    }

    /// Sends the ack with the given argument list.
    ///
    /// # Errors
    /// Returns [`SocketError::Closed`] if the connection is gone.
    pub fn send(self, args: Vec<Value>) -> Result<(), SocketError> {
        let frame = AckFrame {
            ack: self.ack_id,
            data: args,
        };
        let text = JsonCodec.encode(&frame)?;
        self.outbound.send(text).map_err(|_| SocketError::Closed)
    }
}

impl fmt::Debug for ReplyStub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplyStub")
            .field("ack_id", &self.ack_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// HandlerMap
// ---------------------------------------------------------------------------

/// Event-name → handler registry, shared between a socket and whoever
/// outlives it.
///
/// One handler per name; registering again replaces the previous handler
/// (last registration wins). Cheap to clone — the initiator hands the same
/// map to every reconnect attempt's fresh socket so registrations survive
/// the connection they were made on.
#[derive(Clone, Default)]
pub struct HandlerMap {
    inner: Arc<Mutex<HashMap<String, EventHandler>>>,
}

impl HandlerMap {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `event`, replacing any previous one.
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Vec<EventArg>) + Send + Sync + 'static,
    {
        self.inner.lock().insert(event.into(), Arc::new(handler));
    }

    /// Looks up the handler for `event`.
    ///
    /// Returns a clone so the registry lock is never held while a handler
    /// runs (handlers may re-register).
    pub fn get(&self, event: &str) -> Option<EventHandler> {
        self.inner.lock().get(event).cloned()
    }

    /// Number of registered event names.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
