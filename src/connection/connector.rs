//! Transport connectors
//!
//! A connector turns an endpoint address into a duplex byte stream.

use std::future::Future;
use std::io;
use std::path::Path;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::UnixStream;

/// Establishes byte streams to an endpoint
pub trait Connector: Send + Sync + 'static {
    /// Stream produced by a successful connect
    type Stream: AsyncRead + AsyncWrite + Send + Unpin + 'static;

    /// Open a new stream to `endpoint`
    fn connect(&self, endpoint: &Path) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

/// Connects to a Unix domain socket path
#[derive(Debug, Clone, Copy, Default)]
pub struct UnixConnector;

impl Connector for UnixConnector {
    type Stream = UnixStream;

    fn connect(&self, endpoint: &Path) -> impl Future<Output = io::Result<UnixStream>> + Send {
        let endpoint = endpoint.to_path_buf();
        async move { UnixStream::connect(endpoint).await }
    }
}
