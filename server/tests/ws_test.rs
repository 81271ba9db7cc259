//! Integration tests for the chatroom WebSocket protocol over real sockets.

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chatroom_server::chat::ChatSettings;
use chatroom_server::ws::heartbeat::Heartbeat;
use chatroom_server::{routes, state::AppState};

/// Helper: start the server on a random port and return its address.
async fn start_test_server(settings: ChatSettings) -> SocketAddr {
    start_test_server_with_heartbeat(settings, Heartbeat::default()).await
}

async fn start_test_server_with_heartbeat(settings: ChatSettings, heartbeat: Heartbeat) -> SocketAddr {
    let state = AppState::new(settings).with_heartbeat(heartbeat);
    let app = routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    addr
}

struct TestClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let (stream, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", addr))
            .await
            .expect("Failed to connect to WebSocket");
        Self { stream }
    }

    async fn send(&mut self, frame: Value) {
        self.stream
            .send(Message::Text(frame.to_string().into()))
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .unwrap();
    }

    /// Next JSON frame from the server, skipping control frames.
    async fn recv(&mut self) -> Value {
        loop {
            let msg = tokio::time::timeout(Duration::from_secs(2), self.stream.next())
                .await
                .expect("Expected a server frame within timeout");
            match msg {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(text.as_str()).unwrap();
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
                other => panic!("Unexpected frame: {:?}", other),
            }
        }
    }

    async fn recv_event(&mut self, event: &str) -> Value {
        let frame = self.recv().await;
        assert_eq!(frame["event"], event, "unexpected frame {frame}");
        frame["data"].clone()
    }

    async fn expect_silence(&mut self) {
        self.expect_silence_for(Duration::from_millis(300)).await;
    }

    /// Keep reading for `window`, answering pings, and fail on any data frame.
    async fn expect_silence_for(&mut self, window: Duration) {
        let deadline = tokio::time::Instant::now() + window;
        loop {
            match tokio::time::timeout_at(deadline, self.stream.next()).await {
                Err(_) => return,
                Ok(Some(Ok(Message::Ping(_)))) | Ok(Some(Ok(Message::Pong(_)))) => continue,
                Ok(other) => panic!("Expected no frame, got {:?}", other),
            }
        }
    }

    /// Register and consume the ack, history and own join notice.
    /// Returns (identity, history).
    async fn register(&mut self, id: Value, display_name: Value) -> (Value, Value) {
        self.send(json!({
            "event": "register",
            "request_id": "reg-1",
            "data": {"id": id, "display_name": display_name},
        }))
        .await;

        let ack = self.recv().await;
        assert_eq!(ack["event"], "register");
        assert_eq!(ack["request_id"], "reg-1");
        let identity = ack["data"].clone();

        let history = self.recv_event("chat_history").await;

        let joined = self.recv_event("incoming_message").await;
        assert_eq!(joined["type"], "connected");
        assert_eq!(joined["sender_id"], identity["id"]);

        (identity, history)
    }

    async fn say(&mut self, identity: &Value, text: &str) {
        self.send(json!({
            "event": "message",
            "data": {
                "type": "chatmessage",
                "sender_id": identity["id"],
                "sender_name": identity["display_name"],
                "text": text,
            },
        }))
        .await;
    }

    async fn close(mut self) {
        self.stream.close(None).await.unwrap();
    }
}

async fn health(addr: SocketAddr) -> Value {
    reqwest::get(format!("http://{}/health", addr))
        .await
        .unwrap()
        .json()
        .await
        .unwrap()
}

/// Poll /health until `field` reaches `expected`.
async fn wait_for_health(addr: SocketAddr, field: &str, expected: u64) -> Value {
    for _ in 0..40 {
        let body = health(addr).await;
        if body[field] == expected {
            return body;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("health field {field} never reached {expected}");
}

#[tokio::test]
async fn test_anonymous_clients_get_distinct_identities() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    let (alice, history) = a.register(Value::Null, Value::Null).await;
    assert_eq!(history, json!([]));

    let mut b = TestClient::connect(addr).await;
    let (bob, _) = b.register(Value::Null, Value::Null).await;

    // A also sees B join.
    let joined = a.recv_event("incoming_message").await;
    assert_eq!(joined["sender_id"], bob["id"]);

    assert_ne!(alice["id"], bob["id"]);
    assert_ne!(alice["display_name"], bob["display_name"]);
    for name in [&alice["display_name"], &bob["display_name"]] {
        let name = name.as_str().unwrap();
        assert!(name.starts_with("User") && name.len() == 10, "bad name {name}");
        assert!(name[4..].chars().all(|c| c.is_ascii_uppercase()));
    }
}

#[tokio::test]
async fn test_new_client_receives_history_replay() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    let (alice, _) = a.register(json!("alice-id"), json!("Alice")).await;
    assert_eq!(alice, json!({"id": "alice-id", "display_name": "Alice"}));
    a.say(&alice, "hello").await;
    a.recv_event("incoming_message").await;

    let mut b = TestClient::connect(addr).await;
    let (_, history) = b.register(Value::Null, Value::Null).await;
    assert_eq!(
        history,
        json!([
            {"type": "connected", "sender_id": "alice-id", "sender_name": "Alice"},
            {"type": "chatmessage", "sender_id": "alice-id", "sender_name": "Alice", "text": "hello"},
        ])
    );
}

#[tokio::test]
async fn test_chat_message_reaches_everyone() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    let (alice, _) = a.register(Value::Null, json!("Alice")).await;
    let mut b = TestClient::connect(addr).await;
    b.register(Value::Null, json!("Bob")).await;
    a.recv_event("incoming_message").await;

    a.say(&alice, "hi all").await;
    for client in [&mut a, &mut b] {
        let msg = client.recv_event("incoming_message").await;
        assert_eq!(msg["type"], "chatmessage");
        assert_eq!(msg["text"], "hi all");
        assert_eq!(msg["sender_name"], "Alice");
    }
}

#[tokio::test]
async fn test_message_before_register_is_dropped() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    a.register(Value::Null, json!("Alice")).await;

    let mut early = TestClient::connect(addr).await;
    early
        .say(&json!({"id": "ghost", "display_name": "Ghost"}), "boo")
        .await;

    a.expect_silence().await;
    early.expect_silence().await;
    assert_eq!(health(addr).await["history"], 1);
}

#[tokio::test]
async fn test_rename_collision_is_private() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    a.register(Value::Null, json!("Alice")).await;
    let mut b = TestClient::connect(addr).await;
    let (bob, _) = b.register(Value::Null, Value::Null).await;
    a.recv_event("incoming_message").await;

    b.send(json!({"event": "new_name", "data": {"sender_id": bob["id"], "new_name": "Alice"}}))
        .await;

    let rejection = b.recv_event("incoming_message").await;
    assert_eq!(
        rejection,
        json!({
            "type": "namechange",
            "old_name": bob["display_name"],
            "new_name": "Alice",
            "rejected": true,
        })
    );
    a.expect_silence().await;
    b.expect_silence().await;

    // Ledger unchanged: only the two join notices.
    assert_eq!(health(addr).await["history"], 2);
}

#[tokio::test]
async fn test_accepted_rename_rewrites_history_for_everyone() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    let (alice, _) = a.register(json!("a"), json!("Alice")).await;
    let mut c = TestClient::connect(addr).await;
    let (carol, _) = c.register(json!("c"), json!("Carol")).await;
    a.recv_event("incoming_message").await;

    // Wait for each message to land so history order is deterministic.
    a.say(&alice, "from alice").await;
    a.recv_event("incoming_message").await;
    c.recv_event("incoming_message").await;
    c.say(&carol, "from carol").await;
    a.recv_event("incoming_message").await;
    c.recv_event("incoming_message").await;

    a.send(json!({"event": "new_name", "data": {"sender_id": "a", "new_name": "Bob"}}))
        .await;

    let expected_history = json!([
        {"type": "connected", "sender_id": "a", "sender_name": "Alice"},
        {"type": "connected", "sender_id": "c", "sender_name": "Carol"},
        {"type": "chatmessage", "sender_id": "a", "sender_name": "Bob", "text": "from alice"},
        {"type": "chatmessage", "sender_id": "c", "sender_name": "Carol", "text": "from carol"},
    ]);
    let change = json!({
        "type": "namechange",
        "sender_id": "a",
        "old_name": "Alice",
        "new_name": "Bob",
        "rejected": false,
    });

    assert_eq!(a.recv_event("chat_history").await, expected_history);
    assert_eq!(a.recv_event("update_name").await, change);
    assert_eq!(a.recv_event("incoming_message").await, change);

    assert_eq!(c.recv_event("chat_history").await, expected_history);
    assert_eq!(c.recv_event("incoming_message").await, change);
    c.expect_silence().await;

    // The old name is free again, the new one is taken.
    c.send(json!({"event": "new_name", "data": {"new_name": "Bob"}})).await;
    let rejection = c.recv_event("incoming_message").await;
    assert_eq!(rejection["rejected"], true);
}

#[tokio::test]
async fn test_disconnect_is_announced_to_remaining_clients() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    a.register(json!("a"), json!("Alice")).await;
    let mut b = TestClient::connect(addr).await;
    b.register(json!("b"), json!("Bob")).await;
    a.recv_event("incoming_message").await;

    a.close().await;

    let left = b.recv_event("incoming_message").await;
    assert_eq!(
        left,
        json!({"type": "disconnected", "sender_id": "a", "sender_name": "Alice"})
    );
    wait_for_health(addr, "users", 1).await;

    // The id and name are reusable after the disconnect.
    let mut again = TestClient::connect(addr).await;
    let (identity, _) = again.register(json!("a"), json!("Alice")).await;
    assert_eq!(identity, json!({"id": "a", "display_name": "Alice"}));
}

#[tokio::test]
async fn test_unregistered_disconnect_is_silent() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    a.register(Value::Null, json!("Alice")).await;

    let lurker = TestClient::connect(addr).await;
    wait_for_health(addr, "connections", 2).await;
    lurker.close().await;
    wait_for_health(addr, "connections", 1).await;

    a.expect_silence().await;
    let body = health(addr).await;
    assert_eq!(body["users"], 1);
    assert_eq!(body["history"], 1);
}

#[tokio::test]
async fn test_malformed_frames_are_ignored() {
    let addr = start_test_server(ChatSettings::default()).await;

    let mut a = TestClient::connect(addr).await;
    let (alice, _) = a.register(Value::Null, json!("Alice")).await;

    a.send_raw("this is not json").await;
    a.send(json!({"event": "message", "data": {"type": "chatmessage"}})).await;
    a.send(json!({"event": "teleport", "data": {}})).await;
    a.send(json!({"event": "new_name", "data": {"sender_id": alice["id"]}})).await;
    a.stream
        .send(Message::Binary(vec![0, 1, 2].into()))
        .await
        .unwrap();
    a.expect_silence().await;

    // The connection is still usable.
    a.say(&alice, "still here").await;
    let msg = a.recv_event("incoming_message").await;
    assert_eq!(msg["text"], "still here");
}

#[tokio::test]
async fn test_history_replay_is_capped() {
    let addr = start_test_server(ChatSettings {
        max_messages: 3,
        ..ChatSettings::default()
    })
    .await;

    let mut a = TestClient::connect(addr).await;
    let (alice, _) = a.register(Value::Null, json!("Alice")).await;
    for i in 1..=4 {
        a.say(&alice, &format!("m{i}")).await;
        a.recv_event("incoming_message").await;
    }

    let mut b = TestClient::connect(addr).await;
    let (_, history) = b.register(Value::Null, Value::Null).await;
    let texts: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["m2", "m3", "m4"]);
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = start_test_server(ChatSettings::default()).await;
    let body = health(addr).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["connections"], 0);
    assert_eq!(body["users"], 0);
    assert_eq!(body["history"], 0);
}

fn fast_heartbeat() -> Heartbeat {
    Heartbeat {
        interval: Duration::from_millis(100),
        timeout: Duration::from_millis(200),
    }
}

#[tokio::test]
async fn test_unresponsive_peer_is_dropped_and_announced() {
    let addr = start_test_server_with_heartbeat(ChatSettings::default(), fast_heartbeat()).await;

    let mut silent = TestClient::connect(addr).await;
    silent.register(json!("silent-id"), json!("Silent")).await;
    let mut observer = TestClient::connect(addr).await;
    observer.register(Value::Null, json!("Observer")).await;

    // From here on `silent` never reads, so it never answers a ping.
    let left = observer.recv_event("incoming_message").await;
    assert_eq!(
        left,
        json!({"type": "disconnected", "sender_id": "silent-id", "sender_name": "Silent"})
    );
    wait_for_health(addr, "users", 1).await;

    // Its identity is free for the reconnect.
    let mut back = TestClient::connect(addr).await;
    let (identity, _) = back.register(json!("silent-id"), json!("Silent")).await;
    assert_eq!(identity, json!({"id": "silent-id", "display_name": "Silent"}));
    drop(silent);
}

#[tokio::test]
async fn test_responsive_peer_survives_heartbeats() {
    let addr = start_test_server_with_heartbeat(ChatSettings::default(), fast_heartbeat()).await;

    let mut a = TestClient::connect(addr).await;
    let (alice, _) = a.register(Value::Null, json!("Alice")).await;

    // Reading answers pings; several intervals pass without a drop.
    a.expect_silence_for(Duration::from_millis(1000)).await;
    let body = health(addr).await;
    assert_eq!(body["users"], 1);
    assert_eq!(body["connections"], 1);

    a.say(&alice, "still alive").await;
    assert_eq!(a.recv_event("incoming_message").await["text"], "still alive");
}
