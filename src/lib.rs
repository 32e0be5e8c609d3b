//! EdgeRPC - JSON-RPC client for Unix socket daemons
//!
//! This library provides a lazily connecting JSON-RPC client. Each client
//! keeps at most one connection to its daemon, shares a single in-flight
//! connection attempt between concurrent callers, and reconnects on the
//! next call after the daemon closes the connection.
//!
//! ```no_run
//! # async fn run() -> edgerpc::Result<()> {
//! let client = edgerpc::RpcClient::new("/run/imedge/daemon.sock");
//! let version = client.request("system.version", None).await?;
//!
//! let node = client.with_target("edge-node-1");
//! node.notify("poller.reload", None).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod util;

pub use client::RpcClient;
pub use config::Config;
pub use error::{ConnectError, Error, RemoteError, Result, TransportError};

/// Client version for display
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
