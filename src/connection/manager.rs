//! Connection manager
//!
//! Owns at most one live session per client and at most one connection
//! attempt in flight. Concurrent callers that arrive while an attempt is
//! pending all wait on the same shared future.

use futures::FutureExt;
use parking_lot::Mutex;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

use super::connector::{Connector, UnixConnector};
use super::session::RpcSession;
use super::state::{ConnectionPhase, ConnectionState, PendingConnect};
use crate::error::ConnectError;
use crate::metrics::METRICS;

/// Lazily connects to one endpoint and reuses the session
pub struct ConnectionManager<C: Connector = UnixConnector> {
    inner: Arc<Inner<C>>,
}

struct Inner<C> {
    endpoint: PathBuf,
    connector: Arc<C>,
    state: Mutex<ConnectionState>,
    next_generation: AtomicU64,
}

impl<C: Connector> ConnectionManager<C> {
    /// Create a manager in the absent state; nothing is connected yet
    pub fn new(endpoint: impl Into<PathBuf>, connector: Arc<C>) -> Self {
        Self {
            inner: Arc::new(Inner {
                endpoint: endpoint.into(),
                connector,
                state: Mutex::new(ConnectionState::Absent),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Endpoint address
    pub fn endpoint(&self) -> &Path {
        &self.inner.endpoint
    }

    /// Connector shared with derived managers
    pub fn connector(&self) -> &Arc<C> {
        &self.inner.connector
    }

    /// Current lifecycle phase
    pub fn phase(&self) -> ConnectionPhase {
        self.inner.state.lock().phase()
    }

    /// Check whether a live session is held
    pub fn is_connected(&self) -> bool {
        matches!(&*self.inner.state.lock(), ConnectionState::Established(s) if !s.is_closed())
    }

    /// Get the live session, connecting first if needed
    ///
    /// While a connection attempt is in flight every caller awaits that
    /// same attempt and receives the same session or the same error.
    pub async fn acquire(&self) -> Result<Arc<RpcSession>, ConnectError> {
        let attempt = {
            let mut state = self.inner.state.lock();

            if let ConnectionState::Established(session) = &*state {
                if !session.is_closed() {
                    return Ok(session.clone());
                }
                // Closed but the observer has not run yet
                *state = ConnectionState::Absent;
            }

            if let ConnectionState::Pending { attempt, .. } = &*state {
                attempt.clone()
            } else {
                Inner::start_attempt(&self.inner, &mut state)
            }
        };

        attempt.await
    }

    /// Close the current session, if any
    ///
    /// The next `acquire` connects again.
    pub async fn close(&self) {
        let session = {
            let mut state = self.inner.state.lock();
            match std::mem::replace(&mut *state, ConnectionState::Absent) {
                ConnectionState::Established(session) => Some(session),
                other => {
                    *state = other;
                    None
                }
            }
        };

        if let Some(session) = session {
            debug!(endpoint = %self.inner.endpoint.display(), generation = session.generation(), "Closing connection");
            session.close().await;
        }
    }
}

impl<C: Connector> Inner<C> {
    /// Record a new attempt as pending and return it
    ///
    /// The caller holds the state lock.
    fn start_attempt(this: &Arc<Self>, state: &mut ConnectionState) -> PendingConnect {
        let generation = this.next_generation.fetch_add(1, Ordering::Relaxed);
        let connector = this.connector.clone();
        let endpoint = this.endpoint.clone();
        let manager: Weak<Self> = Arc::downgrade(this);

        METRICS.connect_attempt();
        debug!(endpoint = %endpoint.display(), generation, "Connecting");

        // Runs on its own task so that an attempt never settles inside the
        // first caller's poll, before later callers have joined it
        let task = tokio::spawn({
            let endpoint = endpoint.clone();
            async move {
                let result = match connector.connect(&endpoint).await {
                    Ok(stream) => Ok(Arc::new(RpcSession::new(stream, generation))),
                    Err(e) => Err(ConnectError::new(&endpoint, e)),
                };

                if let Some(manager) = manager.upgrade() {
                    manager.settle(generation, &result);
                }
                result
            }
        });

        let attempt = async move {
            match task.await {
                Ok(result) => result,
                Err(e) => Err(ConnectError::new(&endpoint, io::Error::other(e))),
            }
        }
        .boxed()
        .shared();

        *state = ConnectionState::Pending {
            generation,
            attempt: attempt.clone(),
        };
        attempt
    }

    /// Move a pending attempt to its final state
    fn settle(self: &Arc<Self>, generation: u64, result: &Result<Arc<RpcSession>, ConnectError>) {
        let mut state = self.state.lock();
        if !matches!(&*state, ConnectionState::Pending { generation: g, .. } if *g == generation) {
            return;
        }

        match result {
            Ok(session) => {
                METRICS.connection_established();
                debug!(endpoint = %self.endpoint.display(), generation, "Connection established");
                *state = ConnectionState::Established(session.clone());
                drop(state);
                self.observe_close(session);
            }
            Err(e) => {
                METRICS.connection_failed();
                debug!(endpoint = %self.endpoint.display(), generation, error = %e, "Connection failed");
                *state = ConnectionState::Absent;
            }
        }
    }

    /// Reset to absent once `session` closes
    fn observe_close(self: &Arc<Self>, session: &RpcSession) {
        let generation = session.generation();
        let mut closed = session.subscribe_closed();
        let manager = Arc::downgrade(self);

        tokio::spawn(async move {
            let _ = closed.wait_for(|closed| *closed).await;
            if let Some(manager) = manager.upgrade() {
                manager.on_closed(generation);
            }
        });
    }

    fn on_closed(&self, generation: u64) {
        let mut state = self.state.lock();
        // Never clobber a newer connection
        if matches!(&*state, ConnectionState::Established(s) if s.generation() == generation) {
            *state = ConnectionState::Absent;
            debug!(endpoint = %self.endpoint.display(), generation, "Connection closed");
        }
    }
}

impl<C: Connector> std::fmt::Debug for ConnectionManager<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("endpoint", &self.inner.endpoint)
            .field("state", &*self.inner.state.lock())
            .finish()
    }
}
