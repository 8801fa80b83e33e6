// tests/integration/websocket_test.rs

//! Subscriber endpoint tests: admission, rejection, keep-alive and teardown
//! over a real WebSocket connection.

use super::test_helpers::{TestServer, next_close, next_text};
use futures::SinkExt;
use pushbridge::config::Config;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

const POLICY_VIOLATION: u16 = 1008;
const GOING_AWAY: u16 = 1001;

#[tokio::test]
async fn test_subscriber_is_admitted() {
    let server = TestServer::start().await;
    let _ws = server.subscribe("abc").await;
    assert!(server.registry.authenticate("abc"));
    assert_eq!(server.registry.tokens(), vec!["abc".to_string()]);
}

#[tokio::test]
async fn test_duplicate_token_is_closed_with_policy_violation() {
    let server = TestServer::start().await;
    let mut first = server.subscribe("abc").await;

    let mut second = server.connect("abc").await;
    let (code, reason) = next_close(&mut second).await;
    assert_eq!(code, POLICY_VIOLATION);
    assert_eq!(reason, "Token abc already connected");

    // The first session is untouched and still reachable.
    assert!(server.registry.authenticate("abc"));
    let response = server.publish(Some("abc"), "api", "ping", &[]).await;
    assert_eq!(response.status(), 200);
    assert!(next_text(&mut first).await.contains("\"command\":\"ping\""));
}

#[tokio::test]
async fn test_missing_or_empty_token_is_rejected() {
    let server = TestServer::start().await;

    let mut ws = server.connect("").await;
    let (code, reason) = next_close(&mut ws).await;
    assert_eq!(code, POLICY_VIOLATION);
    assert_eq!(reason, "token must not be empty");

    let (mut ws, _) = tokio_tungstenite::connect_async(format!("ws://{}/ws", server.addr))
        .await
        .unwrap();
    let (code, _) = next_close(&mut ws).await;
    assert_eq!(code, POLICY_VIOLATION);
    assert!(server.registry.is_empty());
}

#[tokio::test]
async fn test_disconnect_frees_the_token() {
    let server = TestServer::start().await;
    let mut ws = server.subscribe("abc").await;

    ws.close(None).await.unwrap();
    server.wait_until(|r| !r.authenticate("abc")).await;
    server.wait_until(|r| r.is_empty()).await;

    let _again = server.subscribe("abc").await;
    assert!(server.registry.authenticate("abc"));
}

#[tokio::test]
async fn test_dropped_connection_frees_the_token() {
    let server = TestServer::start().await;
    let ws = server.subscribe("abc").await;
    drop(ws);
    server.wait_until(|r| r.is_empty()).await;
}

#[tokio::test]
async fn test_idle_subscriber_receives_keep_alive() {
    let config = Config {
        keepalive_interval: Duration::from_millis(200),
        ..Config::default()
    };
    let server = TestServer::with_config(config).await;
    let mut ws = server.subscribe("abc").await;

    assert_eq!(next_text(&mut ws).await, "keep_alive");
    assert_eq!(next_text(&mut ws).await, "keep_alive");
    assert!(server.registry.authenticate("abc"));
}

#[tokio::test]
async fn test_inbound_messages_are_ignored_but_keep_session_alive() {
    let server = TestServer::start().await;
    let mut ws = server.subscribe("abc").await;

    ws.send(Message::Text("hello".into())).await.unwrap();
    ws.send(Message::Binary(vec![1, 2, 3].into())).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.registry.authenticate("abc"));
}

#[tokio::test]
async fn test_shutdown_sends_going_away() {
    let server = TestServer::start().await;
    let mut ws = server.subscribe("abc").await;

    server.shutdown_tx.send(()).unwrap();
    let (code, _) = next_close(&mut ws).await;
    assert_eq!(code, GOING_AWAY);
    server.wait_until(|r| r.is_empty()).await;
}
