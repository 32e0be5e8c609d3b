//! Connection state

use futures::future::{BoxFuture, Shared};
use std::sync::Arc;

use super::session::RpcSession;
use crate::error::ConnectError;

/// Outcome of one connection attempt, shared by every waiter
pub type PendingConnect = Shared<BoxFuture<'static, Result<Arc<RpcSession>, ConnectError>>>;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionPhase {
    /// No connection and no attempt in flight
    Absent,
    /// A connection attempt is in flight
    Pending,
    /// A live session is available
    Established,
}

impl std::fmt::Display for ConnectionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionPhase::Absent => "absent",
            ConnectionPhase::Pending => "pending",
            ConnectionPhase::Established => "established",
        };
        f.write_str(name)
    }
}

/// Per-client connection state
pub enum ConnectionState {
    Absent,
    Pending {
        generation: u64,
        attempt: PendingConnect,
    },
    Established(Arc<RpcSession>),
}

impl ConnectionState {
    /// Current phase
    pub fn phase(&self) -> ConnectionPhase {
        match self {
            ConnectionState::Absent => ConnectionPhase::Absent,
            ConnectionState::Pending { .. } => ConnectionPhase::Pending,
            ConnectionState::Established(_) => ConnectionPhase::Established,
        }
    }

    /// Generation of the attempt or session held, if any
    pub fn generation(&self) -> Option<u64> {
        match self {
            ConnectionState::Absent => None,
            ConnectionState::Pending { generation, .. } => Some(*generation),
            ConnectionState::Established(session) => Some(session.generation()),
        }
    }
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.generation() {
            Some(generation) => write!(f, "{}({})", self.phase(), generation),
            None => write!(f, "{}", self.phase()),
        }
    }
}
