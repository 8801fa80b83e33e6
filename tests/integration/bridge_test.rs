// tests/integration/bridge_test.rs

//! Publish endpoint tests: HTTP publisher to WebSocket subscriber.

use super::test_helpers::{TestServer, next_text};
use pushbridge::core::CommandMessage;
use serde_json::Value;

#[tokio::test]
async fn test_publish_round_trip() {
    let server = TestServer::start().await;
    let mut ws = server.subscribe("abc").await;

    let params = [
        ("filename", "test_print.gcode"),
        ("temperature", "200"),
        ("bedtemperature", "60"),
        ("layerheight", "0.2"),
        ("printspeed", "100"),
    ];
    let response = server
        .publish(Some("abc"), "octoprintapi", "startprint", &params)
        .await;
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, Value::String("OK".into()));

    let frame = next_text(&mut ws).await;
    let message = CommandMessage::from_frame(&frame).unwrap().unwrap();
    assert_eq!(message.api, "octoprintapi");
    assert_eq!(message.command, "startprint");
    assert_eq!(message.parameters.len(), 5);
    for (key, value) in params {
        assert_eq!(message.parameters[key], value);
    }
}

#[tokio::test]
async fn test_publish_without_session_is_unauthorized() {
    let server = TestServer::start().await;

    let response = server
        .publish(Some("abc"), "octoprintapi", "startprint", &[("filename", "x")])
        .await;
    assert_eq!(response.status(), 401);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["detail"], "Unauthorized");
}

#[tokio::test]
async fn test_publish_without_credentials_is_unauthorized() {
    let server = TestServer::start().await;
    let _ws = server.subscribe("abc").await;

    let response = server.publish(None, "api", "cmd", &[]).await;
    assert_eq!(response.status(), 401);

    let response = server
        .http
        .post(format!("http://{}/api/cmd", server.addr))
        .header("Authorization", "Basic abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_publish_only_reaches_the_addressed_token() {
    let server = TestServer::start().await;
    let mut abc = server.subscribe("abc").await;
    let mut xyz = server.subscribe("xyz").await;

    let response = server.publish(Some("xyz"), "api", "for_xyz", &[]).await;
    assert_eq!(response.status(), 200);
    let response = server.publish(Some("abc"), "api", "for_abc", &[]).await;
    assert_eq!(response.status(), 200);

    let frame = next_text(&mut abc).await;
    assert_eq!(
        CommandMessage::from_frame(&frame).unwrap().unwrap().command,
        "for_abc"
    );
    let frame = next_text(&mut xyz).await;
    assert_eq!(
        CommandMessage::from_frame(&frame).unwrap().unwrap().command,
        "for_xyz"
    );
}

#[tokio::test]
async fn test_publish_after_disconnect_is_unauthorized() {
    let server = TestServer::start().await;
    let ws = server.subscribe("abc").await;
    drop(ws);
    server.wait_until(|r| !r.authenticate("abc")).await;

    let response = server.publish(Some("abc"), "api", "cmd", &[]).await;
    assert_eq!(response.status(), 401);
}

#[tokio::test]
async fn test_only_post_is_routed() {
    let server = TestServer::start().await;
    let response = server
        .http
        .get(format!("http://{}/api/cmd", server.addr))
        .bearer_auth("abc")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 405);
}

#[tokio::test]
async fn test_credentials_are_checked_before_the_query_string() {
    let server = TestServer::start().await;
    let mut ws = server.subscribe("abc").await;
    let url = format!("http://{}/api/cmd?%ff=%zz&flag&=", server.addr);

    let response = server.http.post(&url).send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = server.http.post(&url).bearer_auth("xyz").send().await.unwrap();
    assert_eq!(response.status(), 401);

    let response = server.http.post(&url).bearer_auth("abc").send().await.unwrap();
    assert_eq!(response.status(), 200);
    let message = CommandMessage::from_frame(&next_text(&mut ws).await)
        .unwrap()
        .unwrap();
    assert_eq!(message.api, "api");
    assert_eq!(message.command, "cmd");
}
