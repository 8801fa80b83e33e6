// tests/integration/registry_test.rs

//! Registry tests through the public API, with in-memory transports.

use super::test_helpers::RecordingSink;
use pushbridge::core::{CommandMessage, PushError, SessionRegistry};
use std::sync::Arc;

fn message(command: &str) -> CommandMessage {
    CommandMessage::new(
        "octoprintapi",
        command,
        [("filename".to_string(), "x.gcode".to_string())],
    )
}

#[tokio::test]
async fn test_independent_registries_do_not_share_tokens() {
    let first = SessionRegistry::new();
    let second = SessionRegistry::new();
    first.admit("abc", RecordingSink::new()).unwrap();
    assert!(second.admit("abc", RecordingSink::new()).is_ok());
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
}

#[tokio::test]
async fn test_authenticate_tracks_session_lifetime() {
    let registry = SessionRegistry::new();
    assert!(!registry.authenticate("abc"));

    registry.admit("abc", RecordingSink::new()).unwrap();
    assert!(registry.authenticate("abc"));

    registry.remove("abc");
    assert!(!registry.authenticate("abc"));
    assert!(registry.remove("abc").is_none());
}

#[tokio::test]
async fn test_publish_writes_exactly_one_frame() {
    let registry = SessionRegistry::new();
    let sink = RecordingSink::new();
    registry.admit("abc", sink.clone()).unwrap();

    registry.publish("abc", &message("startprint")).await.unwrap();
    let frames = sink.frames();
    assert_eq!(frames.len(), 1);
    assert_eq!(
        frames[0],
        r#"{"api":"octoprintapi","command":"startprint","parameters":{"filename":"x.gcode"}}"#
    );
}

#[tokio::test]
async fn test_publish_to_unknown_token_writes_nothing() {
    let registry = SessionRegistry::new();
    let sink = RecordingSink::new();
    registry.admit("other", sink.clone()).unwrap();

    let err = registry.publish("abc", &message("startprint")).await.unwrap_err();
    assert_eq!(err, PushError::NotConnected);
    assert!(sink.frames().is_empty());
}

#[tokio::test]
async fn test_publish_to_broken_transport_is_send_failed() {
    let registry = SessionRegistry::new();
    let sink = RecordingSink::new();
    registry.admit("abc", sink.clone()).unwrap();
    sink.break_transport();

    let err = registry.publish("abc", &message("startprint")).await.unwrap_err();
    assert!(matches!(err, PushError::SendFailed(_)));
    // The failure does not tear the session down; its driver does that.
    assert!(registry.authenticate("abc"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publishes_all_arrive() {
    let registry = Arc::new(SessionRegistry::new());
    let sink = RecordingSink::new();
    registry.admit("abc", sink.clone()).unwrap();

    let mut tasks = Vec::new();
    for i in 0..32 {
        let registry = registry.clone();
        tasks.push(tokio::spawn(async move {
            registry
                .publish("abc", &message(&format!("cmd{i}")))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }
    assert_eq!(sink.frames().len(), 32);
}

#[tokio::test]
async fn test_shutdown_all_keeps_entries_until_drivers_exit() {
    let registry = SessionRegistry::new();
    let session = registry.admit("abc", RecordingSink::new()).unwrap();
    let mut kill_rx = session.kill_signal();

    registry.shutdown_all();
    assert!(kill_rx.recv().await.is_ok());
    assert_eq!(registry.len(), 1);
}
