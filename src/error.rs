//! Error types
//!
//! Every variant is cheap to clone: a failed connection attempt is shared
//! by all callers that were waiting on it.

use serde_json::Value;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

use crate::protocol::FrameError;

/// Result alias for client operations
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Top-level client error
#[derive(Debug, Clone, Error)]
pub enum Error {
    /// The endpoint could not be reached
    #[error(transparent)]
    Connect(#[from] ConnectError),

    /// The established transport failed during a call
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The remote answered with an error object
    #[error(transparent)]
    Protocol(#[from] RemoteError),

    /// The result did not have the shape the caller asked for
    #[error("unexpected result shape: {0}")]
    Decode(Arc<serde_json::Error>),
}

impl Error {
    /// True if this is a connection failure
    pub fn is_connect(&self) -> bool {
        matches!(self, Error::Connect(_))
    }

    /// True if the remote returned an RPC error
    pub fn is_protocol(&self) -> bool {
        matches!(self, Error::Protocol(_))
    }

    /// Remote error object, if any
    pub fn remote(&self) -> Option<&RemoteError> {
        match self {
            Error::Protocol(e) => Some(e),
            _ => None,
        }
    }
}

/// Failure to establish a stream to the endpoint
#[derive(Debug, Clone, Error)]
#[error("failed to connect to {}: {source}", endpoint.display())]
pub struct ConnectError {
    pub endpoint: PathBuf,
    #[source]
    pub source: Arc<io::Error>,
}

impl ConnectError {
    pub fn new(endpoint: impl Into<PathBuf>, source: io::Error) -> Self {
        Self {
            endpoint: endpoint.into(),
            source: Arc::new(source),
        }
    }

    /// Kind of the underlying I/O error
    pub fn kind(&self) -> io::ErrorKind {
        self.source.kind()
    }
}

/// Failure on an established transport
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("i/o error: {0}")]
    Io(Arc<io::Error>),

    #[error("connection closed")]
    Closed,

    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),

    #[error("malformed message: {0}")]
    Json(Arc<serde_json::Error>),

    /// The peer answered with an error it could not tie to a request
    #[error("peer rejected a message: {0}")]
    Rejected(RemoteError),
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(e: serde_json::Error) -> Self {
        TransportError::Json(Arc::new(e))
    }
}

/// Error object returned by the remote for a request
#[derive(Debug, Clone, PartialEq, Error)]
#[error("remote error {code}: {message}")]
pub struct RemoteError {
    pub code: i64,
    pub message: String,
    pub data: Option<Value>,
}
