//! The socket: one connection's ack bookkeeping and event dispatch.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use weave_protocol::{
    AckFrame, Codec, EventFrame, Frame, JsonCodec, SocketId,
};

use crate::{EventArg, HandlerMap, OutArg, ReplyFn, ReplyStub, SocketError};

/// One end of a connection.
///
/// Cheap to clone — a handle over shared state. The socket does not own
/// the underlying channel: outbound frames go into a queue drained by a
/// writer task, and the connection driver feeds inbound text to
/// [`handle_frame`](Self::handle_frame) one frame at a time. Dropping the
/// driver (and every handle) tears the state down; pending acks simply
/// become unreachable, no failure is synthesized for their callers.
#[derive(Clone)]
pub struct Socket {
    shared: Arc<Shared>,
}

struct Shared {
    id: SocketId,
    outbound: mpsc::UnboundedSender<String>,
    codec: JsonCodec,
    /// Next ack id to allocate. Strictly increasing, first id is 1.
    next_ack_id: AtomicU64,
    /// Callbacks awaiting a reply, keyed by ack id. Each entry is removed
    /// (at most once) when the matching ack arrives.
    pending: Mutex<HashMap<u64, ReplyFn>>,
    handlers: HandlerMap,
    /// Gates per-frame diagnostics only, never behavior.
    logs: bool,
}

impl Socket {
    /// Creates a socket over an outbound frame queue.
    ///
    /// `handlers` is shared: the initiator passes the same map to each
    /// reconnect attempt, the acceptor passes a fresh one per connection.
    pub fn new(
        id: SocketId,
        outbound: mpsc::UnboundedSender<String>,
        handlers: HandlerMap,
        logs: bool,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                id,
                outbound,
                codec: JsonCodec,
                next_ack_id: AtomicU64::new(1),
                pending: Mutex::new(HashMap::new()),
                handlers,
                logs,
            }),
        }
    }

    /// This connection's identifier.
    pub fn id(&self) -> &SocketId {
        &self.shared.id
    }

    /// Returns `true` while the outbound channel is still up.
    pub fn is_open(&self) -> bool {
        !self.shared.outbound.is_closed()
    }

    /// Registers a handler for `event` — last registration wins.
    pub fn on<F>(&self, event: impl Into<String>, handler: F)
    where
        F: Fn(Vec<EventArg>) + Send + Sync + 'static,
    {
        self.shared.handlers.on(event, handler);
    }

    /// Number of acks still awaiting a reply.
    pub fn pending_acks(&self) -> usize {
        self.shared.pending.lock().len()
    }

    // -----------------------------------------------------------------
    // Outbound
    // -----------------------------------------------------------------

    /// Emits a named event with an ordered argument list.
    ///
    /// Each [`OutArg::Reply`] position is assigned a fresh ack id,
    /// recorded as pending, and transmitted as the id; the set of replaced
    /// positions travels as `ackI` in ascending order.
    ///
    /// # Errors
    /// Returns [`SocketError::Closed`] when the connection is torn down.
    pub fn emit(
        &self,
        event: &str,
        args: Vec<OutArg>,
    ) -> Result<(), SocketError> {
        let mut data = Vec::with_capacity(args.len());
        let mut ack_indices = Vec::new();

        for (index, arg) in args.into_iter().enumerate() {
            match arg {
                OutArg::Value(value) => data.push(value),
                OutArg::Reply(callback) => {
                    let ack_id = self
                        .shared
                        .next_ack_id
                        .fetch_add(1, Ordering::Relaxed);
                    self.shared.pending.lock().insert(ack_id, callback);
                    data.push(Value::from(ack_id));
                    ack_indices.push(index);
                }
            }
        }

        let frame = EventFrame {
            evt: event.to_string(),
            data,
            ack_indices: if ack_indices.is_empty() {
                None
            } else {
                Some(ack_indices)
            },
        };
        let text = self.shared.codec.encode(&frame)?;
        self.shared
            .outbound
            .send(text)
            .map_err(|_| SocketError::Closed)
    }

    // -----------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------

    /// Handles one inbound frame.
    ///
    /// Malformed input, unknown events, and stale acks are dropped without
    /// error — none of them is fatal to the connection.
    pub fn handle_frame(&self, raw: &str) {
        let frame: Frame = match self.shared.codec.decode(raw) {
            Ok(frame) => frame,
            Err(e) => {
                if self.shared.logs {
                    tracing::debug!(
                        socket = %self.shared.id,
                        error = %e,
                        "dropping malformed frame"
                    );
                }
                return;
            }
        };

        match frame {
            Frame::Ack(ack) => self.resolve_ack(ack),
            Frame::Event(event) => self.dispatch_event(event),
        }
    }

    /// Resolves a pending ack: remove, then invoke outside the lock.
    ///
    /// An id that is absent (already consumed, or issued by a previous
    /// incarnation of this connection) is ignored.
    fn resolve_ack(&self, frame: AckFrame) {
        let callback = self.shared.pending.lock().remove(&frame.ack);
        match callback {
            Some(callback) => callback(frame.data),
            None => {
                if self.shared.logs {
                    tracing::debug!(
                        socket = %self.shared.id,
                        ack_id = frame.ack,
                        "ignoring unknown ack"
                    );
                }
            }
        }
    }

    /// Rebuilds reply stubs at the positions listed in `ackI`, then
    /// spreads the argument list into the registered handler.
    fn dispatch_event(&self, frame: EventFrame) {
        let EventFrame {
            evt,
            data,
            ack_indices,
        } = frame;

        let mut args: Vec<EventArg> =
            data.into_iter().map(EventArg::Value).collect();

        if let Some(indices) = ack_indices {
            for index in indices {
                // A falsy or missing value at an ack position stops the
                // scan: the remaining indices are assumed malformed too.
                // Documented short-circuit, kept as-is.
                let ack_id = match args.get(index) {
                    Some(EventArg::Value(value)) if !is_falsy(value) => {
                        match value.as_u64() {
                            Some(id) => id,
                            None => break,
                        }
                    }
                    _ => break,
                };
                args[index] = EventArg::Reply(ReplyStub::new(
                    ack_id,
                    self.shared.outbound.clone(),
                ));
            }
        }

        let Some(handler) = self.shared.handlers.get(&evt) else {
            if self.shared.logs {
                tracing::debug!(
                    socket = %self.shared.id,
                    event = %evt,
                    "no handler registered, dropping event"
                );
            }
            return;
        };
        handler(args);
    }
}

/// JavaScript-style truthiness for the ack-index scan.
fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f == 0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for the connection engine. Everything here runs without
    //! a network: the socket writes into an in-memory queue whose receiver
    //! the tests inspect (or feed back into a peer socket).

    use super::*;
    use serde_json::json;
    use std::sync::Mutex as StdMutex;
    use tokio::sync::mpsc::UnboundedReceiver;

    /// A socket wired to an in-memory queue, plus the queue's read end.
    fn socket() -> (Socket, UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let socket =
            Socket::new(SocketId::from("test"), tx, HandlerMap::new(), false);
        (socket, rx)
    }

    /// Drains one encoded frame from the queue and parses it as JSON.
    fn next_frame(rx: &mut UnboundedReceiver<String>) -> Value {
        let text = rx.try_recv().expect("expected an outbound frame");
        serde_json::from_str(&text).expect("outbound frame should be JSON")
    }

    // =====================================================================
    // emit()
    // =====================================================================

    #[test]
    fn test_emit_plain_values_omits_ack_indices() {
        let (socket, mut rx) = socket();

        socket
            .emit("greet", vec![json!("hi").into(), json!(2).into()])
            .expect("emit should succeed");

        let frame = next_frame(&mut rx);
        assert_eq!(frame["evt"], "greet");
        assert_eq!(frame["data"], json!(["hi", 2]));
        assert!(frame.get("ackI").is_none());
    }

    #[test]
    fn test_emit_no_args_omits_data() {
        let (socket, mut rx) = socket();

        socket.emit("ping", vec![]).expect("emit should succeed");

        assert_eq!(next_frame(&mut rx), json!({"evt": "ping"}));
    }

    #[test]
    fn test_emit_replaces_replies_with_ids_ascending() {
        let (socket, mut rx) = socket();

        socket
            .emit(
                "call",
                vec![
                    OutArg::reply(|_| {}),
                    json!("mid").into(),
                    OutArg::reply(|_| {}),
                ],
            )
            .expect("emit should succeed");

        let frame = next_frame(&mut rx);
        // First id is 1, strictly increasing; ackI lists exactly the
        // reply positions in ascending order.
        assert_eq!(frame["data"], json!([1, "mid", 2]));
        assert_eq!(frame["ackI"], json!([0, 2]));
        assert_eq!(socket.pending_acks(), 2);
    }

    #[test]
    fn test_emit_ack_ids_strictly_increase_across_calls() {
        let (socket, mut rx) = socket();

        socket.emit("a", vec![OutArg::reply(|_| {})]).unwrap();
        socket.emit("b", vec![OutArg::reply(|_| {})]).unwrap();

        assert_eq!(next_frame(&mut rx)["data"], json!([1]));
        assert_eq!(next_frame(&mut rx)["data"], json!([2]));
    }

    #[test]
    fn test_emit_after_channel_closed_returns_closed() {
        let (socket, rx) = socket();
        drop(rx);

        let result = socket.emit("ping", vec![]);
        assert!(matches!(result, Err(SocketError::Closed)));
        assert!(!socket.is_open());
    }

    // =====================================================================
    // Ack resolution
    // =====================================================================

    #[test]
    fn test_ack_invokes_callback_with_args_exactly_once() {
        let (socket, _rx) = socket();
        let seen: Arc<StdMutex<Vec<Vec<Value>>>> =
            Arc::new(StdMutex::new(Vec::new()));

        let seen_in = Arc::clone(&seen);
        socket
            .emit(
                "call",
                vec![OutArg::reply(move |args| {
                    seen_in.lock().unwrap().push(args);
                })],
            )
            .unwrap();

        socket.handle_frame(r#"{"ack": 1, "data": ["ok", 7]}"#);
        // Second delivery of the same id must be ignored.
        socket.handle_frame(r#"{"ack": 1, "data": ["again"]}"#);

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], vec![json!("ok"), json!(7)]);
        assert_eq!(socket.pending_acks(), 0);
    }

    #[test]
    fn test_ack_with_unknown_id_is_ignored() {
        let (socket, _rx) = socket();

        // Never issued — must not panic or error.
        socket.handle_frame(r#"{"ack": 99, "data": []}"#);
        assert_eq!(socket.pending_acks(), 0);
    }

    // =====================================================================
    // Event dispatch
    // =====================================================================

    #[test]
    fn test_dispatch_spreads_args_positionally() {
        let (socket, _rx) = socket();
        let seen: Arc<StdMutex<Vec<Value>>> =
            Arc::new(StdMutex::new(Vec::new()));

        let seen_in = Arc::clone(&seen);
        socket.on("greet", move |args| {
            let mut seen = seen_in.lock().unwrap();
            for arg in args {
                seen.push(arg.as_value().cloned().unwrap_or(Value::Null));
            }
        });

        socket.handle_frame(r#"{"evt": "greet", "data": ["hi", true]}"#);

        assert_eq!(*seen.lock().unwrap(), vec![json!("hi"), json!(true)]);
    }

    #[test]
    fn test_dispatch_without_handler_is_dropped() {
        let (socket, _rx) = socket();
        // No handler registered — nothing should panic.
        socket.handle_frame(r#"{"evt": "mystery", "data": [1]}"#);
    }

    #[test]
    fn test_dispatch_malformed_json_is_dropped() {
        let (socket, _rx) = socket();
        socket.handle_frame("{{{ not json");
    }

    #[test]
    fn test_dispatch_missing_evt_is_dropped() {
        let (socket, _rx) = socket();
        let called = Arc::new(StdMutex::new(false));
        let called_in = Arc::clone(&called);
        socket.on("x", move |_| *called_in.lock().unwrap() = true);

        socket.handle_frame(r#"{"data": ["hi"]}"#);
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn test_dispatch_data_not_sequence_is_dropped() {
        let (socket, _rx) = socket();
        let called = Arc::new(StdMutex::new(false));
        let called_in = Arc::clone(&called);
        socket.on("greet", move |_| *called_in.lock().unwrap() = true);

        socket.handle_frame(r#"{"evt": "greet", "data": "hi"}"#);
        assert!(!*called.lock().unwrap());
    }

    #[test]
    fn test_last_handler_registration_wins() {
        let (socket, _rx) = socket();
        let hits: Arc<StdMutex<Vec<&'static str>>> =
            Arc::new(StdMutex::new(Vec::new()));

        let first = Arc::clone(&hits);
        socket.on("evt", move |_| first.lock().unwrap().push("first"));
        let second = Arc::clone(&hits);
        socket.on("evt", move |_| second.lock().unwrap().push("second"));

        socket.handle_frame(r#"{"evt": "evt"}"#);

        assert_eq!(*hits.lock().unwrap(), vec!["second"]);
    }

    // =====================================================================
    // Reply stubs
    // =====================================================================

    #[test]
    fn test_stub_sends_ack_with_captured_id() {
        let (socket, mut rx) = socket();

        socket.on("greet", |mut args| {
            let stub = args.remove(1).into_reply().expect("position 1 is a stub");
            assert_eq!(stub.ack_id(), 5);
            stub.send(vec![json!("ok")]).expect("stub send");
        });

        socket.handle_frame(
            r#"{"evt": "greet", "data": ["hi", 5], "ackI": [1]}"#,
        );

        assert_eq!(
            next_frame(&mut rx),
            json!({"ack": 5, "data": ["ok"]})
        );
    }

    #[test]
    fn test_falsy_value_at_ack_index_stops_scan() {
        let (socket, _rx) = socket();
        let kinds: Arc<StdMutex<Vec<bool>>> =
            Arc::new(StdMutex::new(Vec::new()));

        let kinds_in = Arc::clone(&kinds);
        socket.on("mixed", move |args| {
            let mut kinds = kinds_in.lock().unwrap();
            for arg in args {
                kinds.push(matches!(arg, EventArg::Reply(_)));
            }
        });

        // Position 1 holds 0 (falsy) — the scan stops there, so the id
        // at position 2 is never turned into a stub.
        socket.handle_frame(
            r#"{"evt": "mixed", "data": [7, 0, 9], "ackI": [0, 1, 2]}"#,
        );

        assert_eq!(*kinds.lock().unwrap(), vec![true, false, false]);
    }

    #[test]
    fn test_out_of_range_ack_index_stops_scan() {
        let (socket, _rx) = socket();
        let called = Arc::new(StdMutex::new(false));
        let called_in = Arc::clone(&called);
        socket.on("evt", move |args| {
            assert!(matches!(args[0], EventArg::Value(_)));
            *called_in.lock().unwrap() = true;
        });

        socket.handle_frame(r#"{"evt": "evt", "data": [1], "ackI": [5, 0]}"#);

        // The event still dispatches; only stub rebuilding stopped.
        assert!(*called.lock().unwrap());
    }

    // =====================================================================
    // Peer-to-peer scenario
    // =====================================================================

    /// Pumps every queued outbound frame from `rx` into `peer`.
    fn pump(rx: &mut UnboundedReceiver<String>, peer: &Socket) {
        while let Ok(text) = rx.try_recv() {
            peer.handle_frame(&text);
        }
    }

    #[test]
    fn test_greet_ack_round_trip_between_two_sockets() {
        // client emits ("greet", "hi", reply) → server's handler answers
        // through the stub → client's callback sees ("ok") exactly once.
        let (client, mut client_out) = socket();
        let (server, mut server_out) = socket();

        server.on("greet", |mut args| {
            assert_eq!(args[0].as_value(), Some(&json!("hi")));
            let stub = args.remove(1).into_reply().expect("stub");
            stub.send(vec![json!("ok")]).expect("stub send");
        });

        let replies: Arc<StdMutex<Vec<Vec<Value>>>> =
            Arc::new(StdMutex::new(Vec::new()));
        let replies_in = Arc::clone(&replies);
        client
            .emit(
                "greet",
                vec![
                    json!("hi").into(),
                    OutArg::reply(move |args| {
                        replies_in.lock().unwrap().push(args);
                    }),
                ],
            )
            .unwrap();

        pump(&mut client_out, &server);
        pump(&mut server_out, &client);

        let replies = replies.lock().unwrap();
        assert_eq!(replies.len(), 1, "callback must fire exactly once");
        assert_eq!(replies[0], vec![json!("ok")]);
        assert_eq!(client.pending_acks(), 0);
    }
}
