//! End-to-end tests over real WebSocket connections.

use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tycoon_server::{ServerConfig, TycoonServer};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

fn local_config() -> ServerConfig {
    ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0))).with_max_connections_per_address(8)
}

async fn start_server() -> (Arc<TycoonServer>, SocketAddr) {
    start_server_with(local_config()).await
}

async fn start_server_with(config: ServerConfig) -> (Arc<TycoonServer>, SocketAddr) {
    let server = Arc::new(TycoonServer::new(config).unwrap());
    let listener = server.bind().unwrap();
    let addr = listener.local_addr().unwrap();

    let serving = server.clone();
    tokio::spawn(async move {
        serving.serve(listener).await.unwrap();
    });
    (server, addr)
}

async fn join(addr: SocketAddr, name: &str) -> Client {
    let url = format!("ws://{addr}/ws/{name}");
    let (client, _) = tokio::time::timeout(WAIT, connect_async(url))
        .await
        .expect("connect timed out")
        .expect("handshake failed");
    client
}

/// Next JSON notification, skipping transport-level frames.
async fn next_json(client: &mut Client) -> Value {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("no message before timeout")
            .expect("stream ended")
            .expect("transport error");
        match message {
            Message::Text(text) => return serde_json::from_str(text.as_str()).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

async fn next_of_type(client: &mut Client, kind: &str) -> Value {
    loop {
        let value = next_json(client).await;
        if value["type"] == kind {
            return value;
        }
    }
}

/// Waits for the server to close the socket and returns the close code.
async fn close_code(client: &mut Client) -> u16 {
    loop {
        let message = tokio::time::timeout(WAIT, client.next())
            .await
            .expect("no close before timeout");
        match message {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(_)) => continue,
            other => panic!("expected close frame, got {other:?}"),
        }
    }
}

async fn send(client: &mut Client, value: Value) {
    client.send(Message::text(value.to_string())).await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_lobby_and_game_start() {
    let (_server, addr) = start_server().await;

    let mut alice = join(addr, "Alice").await;
    let list = next_of_type(&mut alice, "player_list").await;
    assert_eq!(list["players"], json!(["Alice"]));
    assert_eq!(list["host"], "Alice");

    let mut bob = join(addr, "Bob").await;
    let list = next_of_type(&mut bob, "player_list").await;
    assert_eq!(list["players"], json!(["Alice", "Bob"]));
    let list = next_of_type(&mut alice, "player_list").await;
    assert_eq!(list["players"], json!(["Alice", "Bob"]));

    send(&mut bob, json!({"action": "ping"})).await;
    assert_eq!(next_json(&mut bob).await["type"], "pong");

    send(&mut bob, json!({"action": "start_game"})).await;
    let error = next_of_type(&mut bob, "error").await;
    assert_eq!(error["message"], "Only the host can start the game");
    assert_eq!(error["action"], "start_game");

    send(&mut alice, json!({"action": "choose_color", "color": "#ff6b6b"})).await;
    let selected = next_of_type(&mut alice, "color_selected").await;
    assert_eq!(selected["color"], "#ff6b6b");

    send(&mut alice, json!({"action": "start_game"})).await;
    for client in [&mut alice, &mut bob] {
        let started = next_of_type(client, "game_started").await;
        assert_eq!(started["current_player"], "Alice");
        assert_eq!(started["host"], "Alice");
        assert_eq!(started["players"].as_array().unwrap().len(), 2);
        assert_eq!(started["players"][0]["cash"], 1500);
        assert_eq!(started["board"].as_array().unwrap().len(), 28);
        assert_eq!(started["player_colors"]["Alice"], "#ff6b6b");
    }

    send(&mut bob, json!({"action": "roll_dice"})).await;
    let error = next_of_type(&mut bob, "error").await;
    assert_eq!(error["action"], "roll");

    send(&mut alice, json!({"action": "roll_dice"})).await;
    for client in [&mut alice, &mut bob] {
        let result = next_of_type(client, "turn_result").await;
        assert_eq!(result["player"], "Alice");
        let total = result["dice_total"].as_u64().unwrap();
        assert!((2..=12).contains(&total));
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn test_admission_rejections() {
    let (_server, addr) = start_server().await;

    let mut alice = join(addr, "Alice").await;
    next_of_type(&mut alice, "player_list").await;

    let mut impostor = join(addr, "Alice").await;
    assert_eq!(close_code(&mut impostor).await, 4002);

    let mut bob = join(addr, "Bob").await;
    next_of_type(&mut bob, "player_list").await;
    send(&mut alice, json!({"action": "start_game"})).await;
    next_of_type(&mut bob, "game_started").await;

    let mut latecomer = join(addr, "Carol").await;
    assert_eq!(close_code(&mut latecomer).await, 4003);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reconnect_during_game() {
    let (server, addr) = start_server().await;

    let mut alice = join(addr, "Alice").await;
    next_of_type(&mut alice, "player_list").await;
    let mut bob = join(addr, "Bob").await;
    next_of_type(&mut bob, "player_list").await;
    send(&mut alice, json!({"action": "start_game"})).await;
    next_of_type(&mut alice, "game_started").await;
    next_of_type(&mut bob, "game_started").await;

    bob.close(None).await.unwrap();
    let left = next_of_type(&mut alice, "player_left").await;
    assert_eq!(left["player"], "Bob");
    assert_eq!(left["remaining_players"], json!(["Alice"]));
    let list = next_of_type(&mut alice, "player_list").await;
    assert_eq!(list["players"], json!(["Alice"]));

    let status = server.room().status().await.unwrap();
    assert!(status.game_started);
    assert_eq!(status.players, vec!["Alice".to_string()]);

    let mut bob = join(addr, "Bob").await;
    let welcome = next_of_type(&mut bob, "game_reconnect").await;
    assert_eq!(welcome["current_player"], "Alice");
    assert!(welcome["message"].as_str().unwrap().contains("Bob"));
    assert_eq!(welcome["players"][1]["name"], "Bob");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_admin_kick_and_reset() {
    let (server, addr) = start_server().await;
    let room = server.room();

    let mut alice = join(addr, "Alice").await;
    next_of_type(&mut alice, "player_list").await;
    let mut bob = join(addr, "Bob").await;
    next_of_type(&mut bob, "player_list").await;

    let status = room.status().await.unwrap();
    assert_eq!(status.total_connections, 2);
    assert_eq!(status.host.as_deref(), Some("Alice"));
    assert_eq!(status.address_connections.get("127.0.0.1"), Some(&2));

    assert!(room.kick("Bob").await.unwrap());
    assert!(!room.kick("Bob").await.unwrap());
    assert_eq!(close_code(&mut bob).await, 4003);
    let left = next_of_type(&mut alice, "player_left").await;
    assert_eq!(left["player"], "Bob");

    send(&mut alice, json!({"action": "start_game"})).await;
    let error = next_of_type(&mut alice, "error").await;
    assert_eq!(error["action"], "start_game");

    assert_eq!(room.reset().await.unwrap(), 1);
    assert_eq!(close_code(&mut alice).await, 4004);

    let report = room.connections().await.unwrap();
    assert_eq!(report.current_connections.total_connections, 0);
    assert!(!report.current_connections.game_started);
    assert!(!report.connection_history.is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_shutdown_closes_clients() {
    let (server, addr) = start_server().await;

    let mut alice = join(addr, "Alice").await;
    next_of_type(&mut alice, "player_list").await;

    server.shutdown();
    assert_eq!(close_code(&mut alice).await, 1001);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_idle_client_receives_ping() {
    let (server, addr) = start_server_with(local_config().with_idle_timeout_secs(1)).await;

    let mut alice = join(addr, "Alice").await;
    next_of_type(&mut alice, "player_list").await;

    let ping = next_of_type(&mut alice, "ping").await;
    assert_eq!(ping, json!({"type": "ping"}));

    let status = server.room().status().await.unwrap();
    assert_eq!(status.players, vec!["Alice".to_string()]);
}
