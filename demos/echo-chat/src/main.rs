//! A small chat demo: one server, two clients, rooms and acks in action.
//!
//! Run with `cargo run -p echo-chat`. The server admits clients that
//! present the shared token, puts everyone in a `lobby` room, and
//! re-broadcasts each `say` event to the other members — acknowledging
//! the sender through the reply stub.

use std::time::Duration;

use serde_json::{Value, json};
use weave::prelude::*;
use weave_client::{ClientBuilder, NoProbe};

const TOKEN: &str = "letmein";

/// Admits clients presenting the shared token.
struct TokenAuth;

impl Authenticator for TokenAuth {
    async fn check(
        &self,
        request: AuthRequest<'_>,
    ) -> Result<bool, weave::AuthFault> {
        Ok(request.token == Some(TOKEN))
    }
}

// ---------------------------------------------------------------------------
// Server bootstrap
// ---------------------------------------------------------------------------

async fn start_server() -> Result<String, WeaveError> {
    let registry = RoomRegistry::new();

    let rooms = registry.clone();
    let server = WeaveServerBuilder::new()
        .bind("127.0.0.1:0")
        .registry(registry)
        .on_connect(move |socket| {
            rooms.join("lobby", socket.id());

            let origin = socket.id().clone();
            let room = rooms.clone();
            socket.on("say", move |mut args| {
                let text = args
                    .first()
                    .and_then(EventArg::as_value)
                    .cloned()
                    .unwrap_or(Value::Null);
                tracing::info!(%origin, %text, "relaying");
                room.emit_excluding(
                    "lobby",
                    &origin,
                    "said",
                    vec![text.into()],
                );
                if let Some(stub) =
                    args.pop().and_then(EventArg::into_reply)
                {
                    let _ = stub.send(vec![json!("delivered")]);
                }
            });
        })
        .build(TokenAuth)
        .await?;

    let addr = server
        .local_addr()
        .map_err(|e| WeaveError::Config(format!("no local addr: {e}")))?
        .to_string();
    tokio::spawn(async move {
        if let Err(e) = server.run().await {
            tracing::error!(error = %e, "server stopped");
        }
    });
    Ok(addr)
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let addr = start_server().await?;
    let url = format!("ws://{addr}/");

    let alice = ClientBuilder::new()
        .token(TOKEN)
        .on("said", |args| {
            println!("alice heard: {:?}", args[0].as_value());
        })
        .connect(url.as_str(), NoProbe)?;

    // Let alice settle into the lobby before bob speaks.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let bob = ClientBuilder::new()
        .token(TOKEN)
        .on_connect(|socket| {
            socket
                .emit(
                    "say",
                    vec![
                        json!("hello from bob").into(),
                        OutArg::reply(|args| {
                            println!("bob's message was acked: {args:?}");
                        }),
                    ],
                )
                .expect("emit");
        })
        .connect(url.as_str(), NoProbe)?;

    // Give the exchange a moment, then shut down.
    tokio::time::sleep(Duration::from_secs(1)).await;
    alice.close();
    bob.close();
    alice.closed().await;
    bob.closed().await;
    Ok(())
}
