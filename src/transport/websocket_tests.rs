use std::net::SocketAddr;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use futures_util::{SinkExt, StreamExt};
use tempfile::tempdir;
use tokio::net::TcpStream;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tower::ServiceExt;
use tungstenite::protocol::Message as WsMessage;

use super::handler::Relay;
use super::router::{AppState, create_router};
use super::server::spawn;
use crate::broker::{CHANNEL, MemoryBroker, Pool, PoolConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    addr: SocketAddr,
    broker: MemoryBroker,
    pool: Pool<MemoryBroker>,
}

impl Harness {
    async fn start() -> Self {
        let broker = MemoryBroker::new();
        let pool = Pool::new(broker.clone(), PoolConfig::default());
        let state = AppState::new(Relay::new(pool.clone()), "static");
        let addr = spawn("127.0.0.1:0", state).await.expect("bind relay");
        Self { addr, broker, pool }
    }

    /// Connects a client and waits until its bridge is subscribed.
    async fn connect(&self) -> Client {
        let before = self.broker.subscriber_count(CHANNEL);
        let (ws, _) = connect_async(format!("ws://{}/socket", self.addr))
            .await
            .expect("WebSocket handshake failed");
        self.wait_until(|h| h.broker.subscriber_count(CHANNEL) > before)
            .await;
        ws
    }

    async fn wait_until(&self, done: impl Fn(&Self) -> bool) {
        tokio::time::timeout(WAIT, async {
            while !done(self) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }
}

async fn send(ws: &mut Client, json: &str) {
    ws.send(WsMessage::Text(json.to_string().into()))
        .await
        .expect("Failed to send message");
}

async fn next_text(ws: &mut Client) -> String {
    let frame = tokio::time::timeout(WAIT, ws.next())
        .await
        .expect("timed out waiting for a message")
        .expect("connection closed")
        .expect("read failed");
    frame.to_text().expect("text frame").to_string()
}

#[tokio::test]
async fn test_handshake_reply_over_socket() {
    let harness = Harness::start().await;
    let mut ws = harness.connect().await;
    let mut observer = harness.broker.subscribe(CHANNEL);

    send(&mut ws, r#"{"type":"test","text":"","user":"alice","date":0}"#).await;

    let reply: serde_json::Value = serde_json::from_str(&next_text(&mut ws).await).unwrap();
    assert_eq!(reply["type"], "test");
    assert_eq!(reply["text"], "Connection Successful...");
    assert_eq!(reply["user"], "server");
    assert!(observer.try_recv().is_err());
}

#[tokio::test]
async fn test_chat_fans_out_verbatim_and_survives_disconnect() {
    let harness = Harness::start().await;
    let mut alice = harness.connect().await;
    let mut bob = harness.connect().await;
    let mut carol = harness.connect().await;

    let record = r#"{"type":"chat","text":"hello","user":"alice","date":1000}"#;
    send(&mut alice, record).await;

    assert_eq!(next_text(&mut bob).await, record);
    assert_eq!(next_text(&mut carol).await, record);
    // The sender receives its own message too.
    assert_eq!(next_text(&mut alice).await, record);

    bob.close(None).await.expect("Failed to close WebSocket");
    harness
        .wait_until(|h| h.broker.subscriber_count(CHANNEL) == 2)
        .await;

    let second = r#"{"type":"chat","text":"still here?","user":"alice","date":1001}"#;
    send(&mut alice, second).await;
    assert_eq!(next_text(&mut carol).await, second);
}

#[tokio::test]
async fn test_messages_from_one_sender_keep_their_order() {
    let harness = Harness::start().await;
    let mut alice = harness.connect().await;
    let mut bob = harness.connect().await;

    for n in 0..20 {
        send(
            &mut alice,
            &format!(r#"{{"type":"chat","text":"m{n}","user":"alice","date":{n}}}"#),
        )
        .await;
    }

    for n in 0..20 {
        let received: serde_json::Value = serde_json::from_str(&next_text(&mut bob).await).unwrap();
        assert_eq!(received["text"], format!("m{n}"));
        assert_eq!(received["date"], n);
    }
}

#[tokio::test]
async fn test_disconnect_releases_broker_connection() {
    let harness = Harness::start().await;
    let baseline = harness.pool.status().active;

    let ws = harness.connect().await;
    assert_eq!(harness.pool.status().active, baseline + 1);

    drop(ws);
    harness
        .wait_until(|h| h.pool.status().active == baseline)
        .await;
    assert_eq!(harness.broker.subscriber_count(CHANNEL), 0);
}

#[tokio::test]
async fn test_malformed_client_message_closes_only_that_client() {
    let harness = Harness::start().await;
    let mut alice = harness.connect().await;
    let mut bob = harness.connect().await;

    send(&mut bob, "this is not a chat record").await;
    harness
        .wait_until(|h| h.broker.subscriber_count(CHANNEL) == 1)
        .await;

    let record = r#"{"type":"chat","text":"ping","user":"alice","date":3}"#;
    send(&mut alice, record).await;
    assert_eq!(next_text(&mut alice).await, record);
}

#[tokio::test]
async fn test_static_assets_are_confined_to_root() {
    let root = tempdir().expect("Failed to create temp dir");
    std::fs::create_dir_all(root.path().join("css")).unwrap();
    std::fs::write(root.path().join("css/main.css"), "body {}").unwrap();
    std::fs::write(root.path().join("secret.txt"), "hidden").unwrap();
    std::fs::create_dir_all(root.path().join("html")).unwrap();
    std::fs::write(root.path().join("html/home.html"), "<h1>convo</h1>").unwrap();

    let pool = Pool::new(MemoryBroker::new(), PoolConfig::default());
    let app = create_router(AppState::new(Relay::new(pool), root.path()));

    let get = |uri: &str| Request::builder().uri(uri).body(Body::empty()).unwrap();

    let response = app.clone().oneshot(get("/static/css/main.css")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
    assert_eq!(&body[..], b"body {}");

    let response = app.clone().oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get("/static/%2E%2E/secret.txt"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app.oneshot(get("/static/css/missing.css")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
