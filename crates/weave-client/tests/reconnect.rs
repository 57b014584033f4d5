//! Integration tests for the connection lifecycle.
//!
//! The acceptors here are bare `tokio-tungstenite` loops so each test
//! produces exactly the closure mode it wants: dropping the stream with
//! no close handshake (abnormal) or completing one (clean).

use std::time::{Duration, Instant};

use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{
    Request, Response,
};
use weave_client::{ClientBuilder, ClientError, NoProbe, StatusProbe};

const WAIT: Duration = Duration::from_secs(5);

/// What the mock acceptor does with each accepted connection.
#[derive(Clone, Copy)]
enum Mode {
    /// Drop the stream with no close handshake.
    DropAbnormally,
    /// Complete the close handshake.
    CloseCleanly,
}

/// One accepted upgrade, as observed by the mock acceptor.
struct Accepted {
    at: Instant,
    target: String,
}

/// Spawns an acceptor that handles every connection per `mode` and
/// reports each accepted upgrade.
async fn mock_server(mode: Mode) -> (String, mpsc::UnboundedReceiver<Accepted>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener
        .local_addr()
        .expect("should have local addr")
        .to_string();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let mut target = String::new();
            let accepted = tokio_tungstenite::accept_hdr_async(
                stream,
                |request: &Request, response: Response| {
                    target = request.uri().to_string();
                    Ok(response)
                },
            )
            .await;
            if tx
                .send(Accepted {
                    at: Instant::now(),
                    target,
                })
                .is_err()
            {
                break;
            }
            match (mode, accepted) {
                (Mode::DropAbnormally, ws) => drop(ws),
                (Mode::CloseCleanly, Ok(mut ws)) => {
                    let _ = ws.close(None).await;
                    while let Some(msg) = ws.next().await {
                        if msg.is_err() {
                            break;
                        }
                    }
                }
                (Mode::CloseCleanly, Err(_)) => {}
            }
        }
    });

    (addr, rx)
}

/// Extracts the `id` query parameter from a request target.
fn id_param(target: &str) -> Option<&str> {
    target
        .split_once('?')?
        .1
        .split('&')
        .find_map(|pair| pair.strip_prefix("id="))
}

// =========================================================================
// Reconnection
// =========================================================================

#[tokio::test]
async fn test_abnormal_close_schedules_one_delayed_attempt() {
    let (addr, mut accepts) = mock_server(Mode::DropAbnormally).await;
    let interval = Duration::from_millis(50);

    let client = ClientBuilder::new()
        .reconnect_interval(interval)
        .connect(format!("ws://{addr}/"), NoProbe)
        .expect("client should start");

    let first = timeout(WAIT, accepts.recv())
        .await
        .expect("first attempt")
        .expect("channel open");
    let second = timeout(WAIT, accepts.recv())
        .await
        .expect("second attempt")
        .expect("channel open");

    // The retry was scheduled, not immediate.
    assert!(
        second.at.duration_since(first.at) >= interval,
        "second attempt should wait out the configured interval"
    );
    client.close();
}

#[tokio::test]
async fn test_each_attempt_derives_a_fresh_session_id() {
    let (addr, mut accepts) = mock_server(Mode::DropAbnormally).await;

    let client = ClientBuilder::new()
        .reconnect_interval(Duration::from_millis(20))
        .token("tok")
        .connect(format!("ws://{addr}/link"), NoProbe)
        .expect("client should start");

    let first = timeout(WAIT, accepts.recv())
        .await
        .expect("first attempt")
        .expect("channel open");
    let second = timeout(WAIT, accepts.recv())
        .await
        .expect("second attempt")
        .expect("channel open");
    client.close();

    let id1 = id_param(&first.target).expect("id on first attempt");
    let id2 = id_param(&second.target).expect("id on second attempt");
    assert_eq!(id1.len(), 32);
    assert_ne!(id1, id2, "session ids are per-attempt");
    // Token precedes the id on the target.
    assert!(first.target.contains("token=tok&id="));
}

#[tokio::test]
async fn test_clean_close_reconnects_while_enabled() {
    let (addr, mut accepts) = mock_server(Mode::CloseCleanly).await;

    let client = ClientBuilder::new()
        .reconnect_interval(Duration::from_millis(20))
        .connect(format!("ws://{addr}/"), NoProbe)
        .expect("client should start");

    for _ in 0..2 {
        timeout(WAIT, accepts.recv())
            .await
            .expect("attempt expected")
            .expect("channel open");
    }
    client.close();
    timeout(WAIT, client.closed())
        .await
        .expect("driver should stop on close()");
}

#[tokio::test]
async fn test_clean_close_with_reconnect_disabled_stays_closed() {
    let (addr, mut accepts) = mock_server(Mode::CloseCleanly).await;

    let client = ClientBuilder::new()
        .reconnect(false)
        .connect(format!("ws://{addr}/"), NoProbe)
        .expect("client should start");

    timeout(WAIT, accepts.recv())
        .await
        .expect("single attempt")
        .expect("channel open");

    // Permanently closed: the driver ends on its own, and no further
    // attempt is ever made.
    timeout(WAIT, client.closed())
        .await
        .expect("driver should stop");
    assert!(
        timeout(Duration::from_millis(300), accepts.recv())
            .await
            .is_err(),
        "no second attempt with reconnection disabled"
    );
}

// =========================================================================
// Status lookup
// =========================================================================

/// A probe with a fixed answer.
struct FixedProbe(Option<u16>);

impl StatusProbe for FixedProbe {
    async fn lookup(&self, _session_id: &str) -> Option<u16> {
        self.0
    }
}

#[tokio::test]
async fn test_recorded_status_replaces_reconnection() {
    let (addr, mut accepts) = mock_server(Mode::DropAbnormally).await;

    let (forbidden_tx, mut forbidden_rx) = mpsc::unbounded_channel();
    let client = ClientBuilder::new()
        .reconnect_interval(Duration::from_millis(20))
        .on_forbidden(move || {
            forbidden_tx.send(()).expect("test channel");
        })
        .connect(format!("ws://{addr}/"), FixedProbe(Some(403)))
        .expect("client should start");

    timeout(WAIT, accepts.recv())
        .await
        .expect("single attempt")
        .expect("channel open");
    timeout(WAIT, forbidden_rx.recv())
        .await
        .expect("forbidden notification")
        .expect("channel open");

    timeout(WAIT, client.closed())
        .await
        .expect("driver stops after an explained failure");
    assert!(
        timeout(Duration::from_millis(300), accepts.recv())
            .await
            .is_err(),
        "an explained failure must not reconnect"
    );
}

// =========================================================================
// Handle behavior
// =========================================================================

#[tokio::test]
async fn test_emit_while_disconnected_returns_not_connected() {
    // Nothing listens on this address; the driver keeps failing to
    // connect while the handle reports NotConnected.
    let client = ClientBuilder::new()
        .reconnect(false)
        .connect("ws://127.0.0.1:9/", NoProbe)
        .expect("client should start");

    let result = client.emit("ping", vec![]);
    assert!(matches!(result, Err(ClientError::NotConnected)));
    assert!(!client.is_connected());
}

#[tokio::test]
async fn test_handlers_survive_reconnects() {
    // An acceptor that greets every connection with one event, then
    // closes cleanly — so each reconnect attempt produces one dispatch.
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("should bind");
    let addr = listener
        .local_addr()
        .expect("should have local addr")
        .to_string();
    tokio::spawn(async move {
        use futures_util::SinkExt;
        use tokio_tungstenite::tungstenite::Message;
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let Ok(mut ws) =
                tokio_tungstenite::accept_async(stream).await
            else {
                continue;
            };
            let frame = r#"{"evt": "late", "data": ["again"]}"#;
            let _ = ws.send(Message::Text(frame.into())).await;
            let _ = ws.close(None).await;
            while let Some(msg) = ws.next().await {
                if msg.is_err() {
                    break;
                }
            }
        }
    });

    let (late_tx, mut late_rx) = mpsc::unbounded_channel();
    let client = ClientBuilder::new()
        .reconnect_interval(Duration::from_millis(20))
        .on("late", move |_| {
            late_tx.send(()).expect("test channel");
        })
        .connect(format!("ws://{addr}/"), NoProbe)
        .expect("client should start");

    // The handler registered once fires on both the first connection and
    // the reconnected one — the registry is shared, not per-attempt.
    for _ in 0..2 {
        timeout(WAIT, late_rx.recv())
            .await
            .expect("event should dispatch")
            .expect("channel open");
    }
    client.close();
}
