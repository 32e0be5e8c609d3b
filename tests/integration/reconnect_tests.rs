//! Connection failure, close observation, and reconnect tests

mod common;

use common::{socket_path, wait_until, CountingConnector, StubDaemon};
use edgerpc::connection::ConnectionPhase;
use edgerpc::RpcClient;
use serde_json::json;
use std::io;
use std::sync::Arc;

#[tokio::test]
async fn test_missing_endpoint_then_daemon_appears() {
    let (_dir, path) = socket_path();
    let client = RpcClient::new(&path);

    let err = client.request("ping", None).await.unwrap_err();
    assert!(err.is_connect());
    match err {
        edgerpc::Error::Connect(e) => {
            assert_eq!(e.kind(), io::ErrorKind::NotFound);
            assert_eq!(e.endpoint, path);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(client.phase(), ConnectionPhase::Absent);

    let _daemon = StubDaemon::start(&path);
    assert_eq!(client.request("ping", None).await.unwrap(), json!("pong"));
}

#[tokio::test]
async fn test_concurrent_calls_against_missing_endpoint_share_one_failure() {
    let (_dir, path) = socket_path();
    let client = Arc::new(RpcClient::with_connector(&path, CountingConnector::default()));

    let (a, b, c) = tokio::join!(
        client.request("ping", None),
        client.request("ping", None),
        client.notify("tick", None)
    );
    assert_eq!(client.connection().connector().calls(), 1);

    let sources: Vec<_> = [a.unwrap_err(), b.unwrap_err(), c.unwrap_err()]
        .into_iter()
        .map(|err| match err {
            edgerpc::Error::Connect(e) => e.source,
            other => panic!("unexpected error: {other}"),
        })
        .collect();
    assert!(sources.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(client.phase(), ConnectionPhase::Absent);
}

#[tokio::test]
async fn test_server_close_then_transparent_reconnect() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = RpcClient::with_connector(&path, CountingConnector::default());

    assert_eq!(client.request("bye", None).await.unwrap(), json!("bye"));
    wait_until(|| client.phase() == ConnectionPhase::Absent).await;
    assert_eq!(client.connection().connector().calls(), 1);

    assert_eq!(client.request("ping", None).await.unwrap(), json!("pong"));
    assert_eq!(client.connection().connector().calls(), 2);
    assert_eq!(daemon.connections(), 2);
}

#[tokio::test]
async fn test_explicit_close_then_reconnect() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path);

    let session = client.connection().acquire().await.unwrap();
    client.close().await;
    assert!(session.is_closed());
    assert_eq!(client.phase(), ConnectionPhase::Absent);

    assert_eq!(client.request("ping", None).await.unwrap(), json!("pong"));
    assert_eq!(daemon.connections(), 2);
}

#[tokio::test]
async fn test_daemon_gone_after_close() {
    let (_dir, path) = socket_path();
    let daemon = StubDaemon::start(&path);
    let client = RpcClient::new(&path);

    client.request("bye", None).await.unwrap();
    wait_until(|| client.phase() == ConnectionPhase::Absent).await;

    drop(daemon);
    std::fs::remove_file(&path).unwrap();

    let err = client.request("ping", None).await.unwrap_err();
    assert!(err.is_connect());
    assert_eq!(client.phase(), ConnectionPhase::Absent);
}
