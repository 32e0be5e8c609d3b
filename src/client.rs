//! JSON-RPC client handle
//!
//! An [`RpcClient`] issues requests and notifications to one endpoint,
//! optionally tagged with a routing target. The connection is opened on
//! first use and reused until the daemon closes it.
//!
//! There is no timeout at this layer; wrap calls in
//! `tokio::time::timeout` if you need one.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::connection::{ConnectionManager, ConnectionPhase, Connector, UnixConnector};
use crate::error::{Error, Result};
use crate::protocol::Envelope;
use crate::util::is_endpoint_writable;

/// Client for a JSON-RPC daemon
pub struct RpcClient<C: Connector = UnixConnector> {
    manager: ConnectionManager<C>,
    target: Option<String>,
}

impl RpcClient<UnixConnector> {
    /// Create a client for the Unix socket at `endpoint`
    pub fn new(endpoint: impl Into<PathBuf>) -> Self {
        Self::with_connector(endpoint, UnixConnector)
    }

    /// Create a client from configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        let client = Self::new(&config.socket);
        match config.target.as_deref() {
            Some(target) => client.with_target(target),
            None => client,
        }
    }
}

impl<C: Connector> RpcClient<C> {
    /// Create a client using a custom connector
    pub fn with_connector(endpoint: impl Into<PathBuf>, connector: C) -> Self {
        Self {
            manager: ConnectionManager::new(endpoint, Arc::new(connector)),
            target: None,
        }
    }

    /// Derive a client for the same endpoint with a routing target
    ///
    /// The derived client keeps its own connection; it does not reuse ours.
    pub fn with_target(&self, target: impl Into<String>) -> Self {
        Self {
            manager: ConnectionManager::new(self.endpoint(), self.manager.connector().clone()),
            target: Some(target.into()),
        }
    }

    /// Socket path of the daemon
    pub fn endpoint(&self) -> &Path {
        self.manager.endpoint()
    }

    /// Routing target attached to every call
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Connection manager backing this client
    pub fn connection(&self) -> &ConnectionManager<C> {
        &self.manager
    }

    /// Current connection phase
    pub fn phase(&self) -> ConnectionPhase {
        self.manager.phase()
    }

    /// Check that the socket path exists and is writable by this process
    ///
    /// A `true` result does not guarantee that connecting will succeed.
    pub fn is_endpoint_writable(&self) -> bool {
        is_endpoint_writable(self.endpoint())
    }

    /// Send a request and return its result
    pub async fn request(&self, method: &str, params: Option<Value>) -> Result<Value> {
        let session = self.manager.acquire().await?;
        session.request(&self.envelope(method, params)).await
    }

    /// Send a request and deserialize its result
    pub async fn request_as<T>(&self, method: &str, params: Option<Value>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let value = self.request(method, params).await?;
        serde_json::from_value(value).map_err(|e| Error::Decode(Arc::new(e)))
    }

    /// Send a notification
    ///
    /// Completes once the message is written; no reply is awaited.
    pub async fn notify(&self, method: &str, params: Option<Value>) -> Result<()> {
        let session = self.manager.acquire().await?;
        session.notify(&self.envelope(method, params)).await
    }

    /// Close the current connection, if any
    pub async fn close(&self) {
        self.manager.close().await;
    }

    fn envelope(&self, method: &str, params: Option<Value>) -> Envelope {
        Envelope::new(method, params).with_target(self.target())
    }
}

impl<C: Connector> std::fmt::Debug for RpcClient<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RpcClient")
            .field("endpoint", &self.endpoint())
            .field("target", &self.target)
            .field("phase", &self.phase())
            .finish()
    }
}
