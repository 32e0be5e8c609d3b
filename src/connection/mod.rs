//! Connection management
//!
//! Lazy connection acquisition, session lifecycle, and transport connectors.

mod connector;
mod manager;
mod session;
mod state;

pub use connector::{Connector, UnixConnector};
pub use manager::ConnectionManager;
pub use session::RpcSession;
pub use state::{ConnectionPhase, ConnectionState};
