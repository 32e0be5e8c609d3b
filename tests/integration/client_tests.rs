//! Request, notification, and routing tests against a stub daemon

mod common;

use common::{socket_path, wait_until, CountingConnector, StubDaemon};
use edgerpc::connection::ConnectionPhase;
use edgerpc::RpcClient;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

#[tokio::test]
async fn test_request_roundtrip() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path);

    assert_eq!(client.phase(), ConnectionPhase::Absent);
    assert_eq!(daemon.connections(), 0);

    let result = client.request("ping", None).await.unwrap();
    assert_eq!(result, json!("pong"));
    assert_eq!(client.phase(), ConnectionPhase::Established);

    let echoed = client
        .request("echo", Some(json!({"command": "graph", "format": "SVG"})))
        .await
        .unwrap();
    assert_eq!(echoed["format"], json!("SVG"));
}

#[tokio::test]
async fn test_connection_is_reused() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path);

    for _ in 0..10 {
        client.request("ping", None).await.unwrap();
    }
    client.notify("tick", None).await.unwrap();

    assert_eq!(daemon.connections(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_share_one_connect() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = Arc::new(RpcClient::with_connector(&path, CountingConnector::default()));

    let a = tokio::spawn({
        let client = client.clone();
        async move { client.request("ping", None).await }
    });
    let b = tokio::spawn({
        let client = client.clone();
        async move { client.request("echo", Some(json!([1, 2]))).await }
    });

    assert_eq!(a.await.unwrap().unwrap(), json!("pong"));
    assert_eq!(b.await.unwrap().unwrap(), json!([1, 2]));
    assert_eq!(client.connection().connector().calls(), 1);
    assert_eq!(daemon.connections(), 1);
}

#[tokio::test]
async fn test_acquire_returns_identical_session() {
    let (_dir, path) = socket_path();
    let _daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path);

    let first = client.connection().acquire().await.unwrap();
    client.request("ping", None).await.unwrap();
    let second = client.connection().acquire().await.unwrap();

    assert!(Arc::ptr_eq(&first, &second));
}

#[tokio::test]
async fn test_with_target_tags_calls_and_connects_independently() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = RpcClient::with_connector(&path, CountingConnector::default());
    let tagged = client.with_target("edge-1");

    assert_eq!(client.request("whoami", None).await.unwrap(), Value::Null);
    assert_eq!(tagged.phase(), ConnectionPhase::Absent);
    assert_eq!(daemon.connections(), 1);

    assert_eq!(tagged.request("whoami", None).await.unwrap(), json!("edge-1"));
    assert_eq!(daemon.connections(), 2);
    assert_eq!(client.connection().connector().calls(), 2);

    // The parent still goes out untagged
    assert_eq!(client.request("whoami", None).await.unwrap(), Value::Null);
}

#[tokio::test]
async fn test_notification_carries_target() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path).with_target("poller");

    client
        .notify("poller.reload", Some(json!({"force": true})))
        .await
        .unwrap();

    wait_until(|| !daemon.notifications().is_empty()).await;
    let received = daemon.notifications();
    assert_eq!(
        received[0],
        json!({"jsonrpc": "2.0", "method": "poller.reload", "params": {"force": true}, "target": "poller"})
    );
}

#[tokio::test]
async fn test_remote_error_is_protocol_error() {
    let (_dir, path) = socket_path();
    let _daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path);

    let err = client.request("fail", None).await.unwrap_err();
    assert!(err.is_protocol());
    let remote = err.remote().unwrap();
    assert_eq!(remote.code, -32000);
    assert_eq!(remote.message, "boom");

    // The connection survives a remote error
    assert_eq!(client.request("ping", None).await.unwrap(), json!("pong"));
}

#[tokio::test]
async fn test_typed_result() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct GraphInfo {
        width: u32,
        height: u32,
    }

    let (_dir, path) = socket_path();
    let _daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path);

    let info: GraphInfo = client
        .request_as("echo", Some(json!({"width": 800, "height": 200})))
        .await
        .unwrap();
    assert_eq!(info, GraphInfo { width: 800, height: 200 });

    let err = client
        .request_as::<GraphInfo>("ping", None)
        .await
        .unwrap_err();
    assert!(matches!(err, edgerpc::Error::Decode(_)));
}

#[tokio::test]
async fn test_endpoint_writable_check() {
    let (dir, path) = socket_path();
    let client = RpcClient::new(&path);
    assert!(!client.is_endpoint_writable());

    let daemon = StubDaemon::start(&path);
    assert!(RpcClient::new(daemon.path()).is_endpoint_writable());
    assert!(!RpcClient::new(dir.path().join("other.sock")).is_endpoint_writable());
}
