//! Atomic counters for client activity
//!
//! Lock-free counters that can be safely updated from any thread. Each
//! update is also reported through the `metrics` facade, which records
//! nothing unless the host application installs a recorder.

use metrics::counter;
use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics instance
pub static METRICS: Metrics = Metrics::new();

/// Atomic metrics counters
pub struct Metrics {
    // Connection metrics
    pub connect_attempts: AtomicU64,
    pub connections_established: AtomicU64,
    pub connections_failed: AtomicU64,
    pub connections_closed: AtomicU64,

    // Call metrics
    pub requests_sent: AtomicU64,
    pub notifications_sent: AtomicU64,
    pub remote_errors: AtomicU64,
    pub transport_errors: AtomicU64,
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            connect_attempts: AtomicU64::new(0),
            connections_established: AtomicU64::new(0),
            connections_failed: AtomicU64::new(0),
            connections_closed: AtomicU64::new(0),
            requests_sent: AtomicU64::new(0),
            notifications_sent: AtomicU64::new(0),
            remote_errors: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
        }
    }

    // Connection tracking
    #[inline]
    pub fn connect_attempt(&self) {
        self.connect_attempts.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_connect_attempts_total").increment(1);
    }

    #[inline]
    pub fn connection_established(&self) {
        self.connections_established.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_connections_established_total").increment(1);
    }

    #[inline]
    pub fn connection_failed(&self) {
        self.connections_failed.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_connections_failed_total").increment(1);
    }

    #[inline]
    pub fn connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_connections_closed_total").increment(1);
    }

    // Call tracking
    #[inline]
    pub fn request_sent(&self) {
        self.requests_sent.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_requests_total").increment(1);
    }

    #[inline]
    pub fn notification_sent(&self) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_notifications_total").increment(1);
    }

    #[inline]
    pub fn remote_error(&self) {
        self.remote_errors.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_remote_errors_total").increment(1);
    }

    #[inline]
    pub fn transport_error(&self) {
        self.transport_errors.fetch_add(1, Ordering::Relaxed);
        counter!("edgerpc_transport_errors_total").increment(1);
    }

    /// Get snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connect_attempts: self.connect_attempts.load(Ordering::Relaxed),
            connections_established: self.connections_established.load(Ordering::Relaxed),
            connections_failed: self.connections_failed.load(Ordering::Relaxed),
            connections_closed: self.connections_closed.load(Ordering::Relaxed),
            requests_sent: self.requests_sent.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            remote_errors: self.remote_errors.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics for reporting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connect_attempts: u64,
    pub connections_established: u64,
    pub connections_failed: u64,
    pub connections_closed: u64,
    pub requests_sent: u64,
    pub notifications_sent: u64,
    pub remote_errors: u64,
    pub transport_errors: u64,
}
