//! Stub daemon shared by the integration tests

#![allow(dead_code)]

use edgerpc::connection::Connector;
use edgerpc::protocol::{write_frame, FrameReader};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::{UnixListener, UnixStream};
use tokio::task::JoinHandle;

/// Minimal JSON-RPC daemon on a Unix socket
///
/// Methods:
/// - `ping` answers `"pong"`
/// - `echo` answers with its params
/// - `whoami` answers with the envelope's `target` member (or null)
/// - `fail` answers with error -32000
/// - `bye` answers `"bye"` and then closes the connection
///
/// Notifications are recorded.
pub struct StubDaemon {
    path: PathBuf,
    connections: Arc<AtomicUsize>,
    notifications: Arc<Mutex<Vec<Value>>>,
    task: JoinHandle<()>,
}

impl StubDaemon {
    pub fn start(path: &Path) -> Self {
        let listener = UnixListener::bind(path).unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let notifications = Arc::new(Mutex::new(Vec::new()));

        let task = tokio::spawn({
            let connections = connections.clone();
            let notifications = notifications.clone();
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(stream, notifications.clone()));
                }
            }
        });

        Self {
            path: path.to_path_buf(),
            connections,
            notifications,
            task,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Connections accepted so far
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Notifications received so far
    pub fn notifications(&self) -> Vec<Value> {
        self.notifications.lock().clone()
    }
}

impl Drop for StubDaemon {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(stream: UnixStream, notifications: Arc<Mutex<Vec<Value>>>) {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = FrameReader::new(read_half);

    while let Ok(Some(frame)) = reader.next_frame().await {
        let message: Value = serde_json::from_slice(&frame).unwrap();
        let Some(id) = message.get("id").cloned() else {
            notifications.lock().push(message);
            continue;
        };

        let reply = match message["method"].as_str().unwrap_or_default() {
            "ping" => json!({"jsonrpc": "2.0", "id": id, "result": "pong"}),
            "echo" => json!({"jsonrpc": "2.0", "id": id, "result": message.get("params").cloned().unwrap_or(Value::Null)}),
            "whoami" => json!({"jsonrpc": "2.0", "id": id, "result": message.get("target").cloned().unwrap_or(Value::Null)}),
            "fail" => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32000, "message": "boom"}}),
            "bye" => {
                let reply = json!({"jsonrpc": "2.0", "id": id, "result": "bye"});
                let _ = write_frame(&mut write_half, &serde_json::to_vec(&reply).unwrap()).await;
                return;
            }
            _ => json!({"jsonrpc": "2.0", "id": id, "error": {"code": -32601, "message": "Method not found"}}),
        };

        if write_frame(&mut write_half, &serde_json::to_vec(&reply).unwrap())
            .await
            .is_err()
        {
            return;
        }
    }
}

/// Fresh temp directory and a socket path inside it
pub fn socket_path() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("daemon.sock");
    (dir, path)
}

/// Poll `check` until it holds or a second passes
pub async fn wait_until(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

/// Unix connector that counts connect calls
#[derive(Default)]
pub struct CountingConnector {
    calls: AtomicUsize,
}

impl CountingConnector {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Connector for CountingConnector {
    type Stream = UnixStream;

    fn connect(&self, endpoint: &Path) -> impl Future<Output = io::Result<UnixStream>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let endpoint = endpoint.to_path_buf();
        async move { UnixStream::connect(endpoint).await }
    }
}
