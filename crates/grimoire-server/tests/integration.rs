//! End-to-end tests over real sockets.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use grimoire_server::{RelayServer, ServerConfig};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn local_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        ..ServerConfig::default()
    }
}

async fn start(config: ServerConfig) -> (RelayServer, SocketAddr) {
    let server = RelayServer::new(config);
    let (addr, _handle) = server.listen().await.unwrap();
    (server, addr)
}

async fn recv(ws: &mut Ws) -> Value {
    loop {
        let msg = tokio::time::timeout(WAIT, ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("socket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

async fn send(ws: &mut Ws, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

/// Connect and consume the `connection.established` event.
async fn connect(addr: SocketAddr) -> (Ws, String) {
    let (mut ws, _) = connect_async(format!("ws://{addr}/ws")).await.unwrap();
    let hello = recv(&mut ws).await;
    assert_eq!(hello["type"], "connection.established");
    let id = hello["data"]["connectionId"].as_str().unwrap().to_owned();
    (ws, id)
}

async fn create(ws: &mut Ws) -> String {
    send(ws, json!({"id": "c", "method": "create-session"})).await;
    let reply = recv(ws).await;
    assert_eq!(reply["id"], "c");
    assert_eq!(reply["success"], true);
    reply["result"]["code"].as_str().unwrap().to_owned()
}

async fn join(ws: &mut Ws, code: &str, name: &str) -> Value {
    send(
        ws,
        json!({"id": "j", "method": "join-session", "params": {"code": code, "name": name}}),
    )
    .await;
    recv(ws).await
}

async fn health(addr: SocketAddr) -> Value {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream
        .write_all(b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n")
        .await
        .unwrap();
    let mut raw = String::new();
    let _ = stream.read_to_string(&mut raw).await.unwrap();
    assert!(raw.starts_with("HTTP/1.1 200"), "unexpected response: {raw}");
    let (_, body) = raw.split_once("\r\n\r\n").unwrap();
    serde_json::from_str(body).unwrap()
}

#[tokio::test]
async fn connection_established_carries_a_unique_id() {
    let (_server, addr) = start(local_config()).await;
    let (_a, id_a) = connect(addr).await;
    let (_b, id_b) = connect(addr).await;
    assert!(id_a.starts_with("conn_"));
    assert_ne!(id_a, id_b);
}

#[tokio::test]
async fn storyteller_and_player_play_a_round() {
    let (_server, addr) = start(local_config()).await;
    let (mut st, _) = connect(addr).await;
    let (mut alice, alice_id) = connect(addr).await;

    let code = create(&mut st).await;
    assert_eq!(code.len(), 4);

    let reply = join(&mut alice, &code, "Alice").await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["result"]["player"]["id"], alice_id.as_str());

    let joined = recv(&mut st).await;
    assert_eq!(joined["type"], "player-joined");
    assert_eq!(joined["sessionCode"], code.as_str());
    assert_eq!(joined["data"]["name"], "Alice");

    send(
        &mut st,
        json!({"method": "assign-role", "params": {"playerId": alice_id, "role": "Imp"}}),
    )
    .await;
    let role = recv(&mut alice).await;
    assert_eq!(role["type"], "role-assigned");
    assert_eq!(role["data"]["role"], "Imp");
    assert_eq!(role["data"]["roleInfo"]["team"], "evil");
    let confirm = recv(&mut st).await;
    assert_eq!(confirm["type"], "role-assigned-confirm");
    assert_eq!(confirm["data"]["playerId"], alice_id.as_str());

    send(
        &mut st,
        json!({"method": "update-phase", "params": {"phase": "night", "dayNum": 2}}),
    )
    .await;
    for ws in [&mut st, &mut alice] {
        let ev = recv(ws).await;
        assert_eq!(ev["type"], "phase-changed");
        assert_eq!(ev["data"], json!({"phase": "night", "dayNum": 2}));
    }

    send(
        &mut st,
        json!({"method": "broadcast-message", "params": {"message": "Night falls"}}),
    )
    .await;
    assert_eq!(recv(&mut alice).await["data"]["message"], "Night falls");
    assert_eq!(recv(&mut st).await["type"], "storyteller-message");
}

#[tokio::test]
async fn players_cannot_drive_the_session() {
    let (_server, addr) = start(local_config()).await;
    let (mut st, _) = connect(addr).await;
    let (mut bob, _) = connect(addr).await;
    let code = create(&mut st).await;
    let _ = join(&mut bob, &code, "Bob").await;
    let _ = recv(&mut st).await;

    send(
        &mut bob,
        json!({"id": "x", "method": "update-phase", "params": {"phase": "day", "dayNum": 5}}),
    )
    .await;
    send(&mut bob, json!({"id": "y", "method": "end-session"})).await;

    // The next frame either side sees must be the answer to this request.
    send(
        &mut bob,
        json!({"id": "z", "method": "join-session", "params": {"code": "ZZZZ", "name": "Bob"}}),
    )
    .await;
    let reply = recv(&mut bob).await;
    assert_eq!(reply["id"], "z");
    assert_eq!(reply["success"], false);

    send(&mut st, json!({"method": "broadcast-message", "params": "still here"})).await;
    let ev = recv(&mut st).await;
    assert_eq!(ev["type"], "storyteller-message");
}

#[tokio::test]
async fn dropped_player_can_reconnect_with_role() {
    let (_server, addr) = start(local_config()).await;
    let (mut st, _) = connect(addr).await;
    let (mut carol, carol_id) = connect(addr).await;
    let code = create(&mut st).await;
    let _ = join(&mut carol, &code, "Carol").await;
    let _ = recv(&mut st).await;

    send(
        &mut st,
        json!({"method": "assign-role", "params": {"playerId": carol_id, "role": "Empath"}}),
    )
    .await;
    let _ = recv(&mut carol).await;
    let _ = recv(&mut st).await;

    carol.close(None).await.unwrap();
    let gone = recv(&mut st).await;
    assert_eq!(gone["type"], "player-disconnected");
    assert_eq!(gone["data"]["name"], "Carol");

    let (mut carol2, carol2_id) = connect(addr).await;
    send(
        &mut carol2,
        json!({"id": "r", "method": "reconnect", "params": {"code": code.to_lowercase(), "name": "carol"}}),
    )
    .await;
    let reply = recv(&mut carol2).await;
    assert_eq!(reply["success"], true);
    assert_eq!(reply["result"]["role"], "Empath");
    assert_eq!(reply["result"]["player"]["id"], carol2_id.as_str());

    let back = recv(&mut st).await;
    assert_eq!(back["type"], "player-reconnected");
    assert_eq!(back["data"]["id"], carol2_id.as_str());
}

#[tokio::test]
async fn end_session_notifies_everyone() {
    let (server, addr) = start(local_config()).await;
    let (mut st, _) = connect(addr).await;
    let (mut dan, _) = connect(addr).await;
    let code = create(&mut st).await;
    let _ = join(&mut dan, &code, "Dan").await;
    let _ = recv(&mut st).await;

    send(&mut st, json!({"method": "end-session"})).await;
    for ws in [&mut st, &mut dan] {
        let ev = recv(ws).await;
        assert_eq!(ev["type"], "session-ended");
        assert_eq!(ev["data"]["reason"], "ended");
    }

    let reply = join(&mut dan, &code, "Dan").await;
    assert_eq!(reply["success"], false);
    assert_eq!(server.stats().sessions, 0);
}

#[tokio::test]
async fn expired_sessions_are_swept() {
    let config = ServerConfig {
        session_max_age: Duration::ZERO,
        sweep_interval: Duration::from_millis(100),
        ..local_config()
    };
    let (_server, addr) = start(config).await;
    let (mut st, _) = connect(addr).await;
    let code = create(&mut st).await;

    let ended = recv(&mut st).await;
    assert_eq!(ended["type"], "session-ended");
    assert_eq!(ended["sessionCode"], code.as_str());
    assert_eq!(ended["data"]["reason"], "expired");
}

#[tokio::test]
async fn health_reports_live_counters() {
    let (_server, addr) = start(local_config()).await;
    let body = health(addr).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["active_sessions"], 0);

    let (mut st, _) = connect(addr).await;
    let _ = create(&mut st).await;

    let body = health(addr).await;
    assert_eq!(body["connections"], 1);
    assert_eq!(body["active_sessions"], 1);
}

#[tokio::test]
async fn graceful_shutdown_closes_sockets() {
    let (server, addr) = start(local_config()).await;
    let (mut ws, _) = connect(addr).await;

    server
        .shutdown()
        .graceful_shutdown(Some(Duration::from_secs(5)))
        .await;

    let next = tokio::time::timeout(WAIT, ws.next()).await.unwrap();
    assert!(matches!(next, None | Some(Ok(Message::Close(_)) | Err(_))));
}
