//! Connection state machine and live-connection registry.
//!
//! # Responsibilities
//! - Generate unique connection IDs for tracing
//! - Name the per-connection lifecycle states
//! - Track live connections for introspection and graceful drain

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;

use crate::observability::metrics;

/// Global atomic counter for connection IDs.
/// Using relaxed ordering is sufficient since we only need uniqueness, not synchronization.
static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Generate a new unique connection ID.
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Get the raw ID value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Lifecycle of one streaming connection.
///
/// ```text
/// Accepted → Identified → Authenticated → Handling → Closed
///     └──────────┴──────────────┴────────────┴──→ Closed (on error)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Transport upgraded; nothing known about the peer yet.
    Accepted,
    /// Identity record resolved.
    Identified,
    /// Authentication policy passed.
    Authenticated,
    /// Handler constructed, registered and running.
    Handling,
    /// Deregistered and transport closed.
    Closed,
}

/// What the registry knows about a live connection.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    pub id: ConnectionId,
    pub device_id: String,
    pub client_id: Option<String>,
    pub peer_addr: Option<SocketAddr>,
    /// Snapshot generation whose modules this connection is pinned to.
    pub generation: u64,
    /// Unix seconds.
    pub connected_at: u64,
}

impl ConnectionInfo {
    pub fn new(
        id: ConnectionId,
        device_id: impl Into<String>,
        client_id: Option<String>,
        peer_addr: Option<SocketAddr>,
        generation: u64,
    ) -> Self {
        Self {
            id,
            device_id: device_id.into(),
            client_id,
            peer_addr,
            generation,
            connected_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
        }
    }
}

/// Concurrent set of live connections.
///
/// Cloning shares the same underlying set.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    live: Arc<DashMap<ConnectionId, ConnectionInfo>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection. The returned guard deregisters it on drop.
    pub fn register(&self, info: ConnectionInfo) -> ConnectionGuard {
        let id = info.id;
        self.live.insert(id, info);
        metrics::record_active_connections(self.live.len());
        tracing::debug!(connection_id = %id, active = self.live.len(), "Connection registered");
        ConnectionGuard {
            registry: self.clone(),
            id,
        }
    }

    /// Remove a connection. Removing an unknown id is a no-op.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = self.live.remove(&id).is_some();
        if removed {
            metrics::record_active_connections(self.live.len());
            tracing::debug!(connection_id = %id, active = self.live.len(), "Connection deregistered");
        }
        removed
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.live.contains_key(&id)
    }

    /// Point-in-time copy of all live connections, oldest first.
    pub fn snapshot(&self) -> Vec<ConnectionInfo> {
        let mut all: Vec<_> = self.live.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|c| c.id.as_u64());
        all
    }

    /// Get current live connection count.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Wait until every connection has deregistered or `timeout` elapses.
    ///
    /// Returns `true` when the registry drained.
    pub async fn wait_for_drain(&self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !self.live.is_empty() {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(remaining = self.live.len(), "Drain timeout reached");
                return false;
            }
            // Check periodically
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }
}

/// Guard that tracks a connection's registration.
/// Deregisters the connection when dropped or released.
#[derive(Debug)]
pub struct ConnectionGuard {
    registry: ConnectionRegistry,
    id: ConnectionId,
}

impl ConnectionGuard {
    /// Get this connection's ID.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Deregister now rather than at drop.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.registry.remove(self.id);
    }
}
