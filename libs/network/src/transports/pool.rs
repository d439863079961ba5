//! Connection Pool
//!
//! Shared table of live connections keyed by connection id. Outbound sends look
//! connections up by the component bound to them; handlers own a
//! [`PoolMembership`] guard that removes their connection when they exit.

use super::connection::Connection;
use flow_types::ComponentId;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Live connections shared between the accept workers, handlers and senders
#[derive(Default)]
pub struct ConnectionPool {
    connections: RwLock<HashMap<u64, Arc<Connection>>>,
    next_id: AtomicU64,
}

/// Pool statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    pub total_connections: usize,
    pub active_connections: usize,
    pub bound_connections: usize,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a connection id
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Add a connection; the returned guard removes it again on drop
    pub fn join(self: &Arc<Self>, connection: Arc<Connection>) -> PoolMembership {
        let id = connection.id();
        self.connections.write().insert(id, connection);
        PoolMembership {
            pool: Arc::clone(self),
            id,
        }
    }

    pub fn get(&self, id: u64) -> Option<Arc<Connection>> {
        self.connections.read().get(&id).cloned()
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Connection>> {
        self.connections.write().remove(&id)
    }

    /// Active connections bound to `component`, most recently heard first
    pub fn find_by_component(&self, component: ComponentId) -> Vec<Arc<Connection>> {
        let mut matches: Vec<_> = self
            .connections
            .read()
            .values()
            .filter(|c| c.is_active() && c.component() == Some(component))
            .cloned()
            .collect();
        matches.sort_by_key(|c| c.heartbeat_age());
        matches
    }

    /// Active connections bound to any component
    pub fn bound(&self) -> Vec<Arc<Connection>> {
        self.connections
            .read()
            .values()
            .filter(|c| c.is_active() && c.component().is_some())
            .cloned()
            .collect()
    }

    /// Every pooled connection
    pub fn snapshot(&self) -> Vec<Arc<Connection>> {
        self.connections.read().values().cloned().collect()
    }

    /// Stop routing outbound sends to a connection
    pub fn mark_inactive(&self, id: u64) -> bool {
        match self.connections.read().get(&id) {
            Some(conn) => {
                conn.mark_inactive();
                true
            }
            None => false,
        }
    }

    /// Remove and close connections that are inactive or whose heartbeat is
    /// older than `heartbeat_timeout`
    pub fn sweep_stale(&self, heartbeat_timeout: Duration) -> Vec<Arc<Connection>> {
        let mut pool = self.connections.write();
        let stale: Vec<u64> = pool
            .iter()
            .filter(|(_, c)| !c.is_active() || c.heartbeat_age() > heartbeat_timeout)
            .map(|(id, _)| *id)
            .collect();

        let removed: Vec<_> = stale.iter().filter_map(|id| pool.remove(id)).collect();
        drop(pool);

        for conn in &removed {
            debug!("🧹 Reclaiming stale connection {}", conn.id());
            conn.close();
        }
        removed
    }

    /// Close every connection (shutdown)
    pub fn close_all(&self) {
        for conn in self.connections.read().values() {
            conn.close();
        }
    }

    pub fn len(&self) -> usize {
        self.connections.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.read().is_empty()
    }

    /// Get pool statistics
    pub fn stats(&self) -> PoolStats {
        let pool = self.connections.read();

        PoolStats {
            total_connections: pool.len(),
            active_connections: pool.values().filter(|c| c.is_active()).count(),
            bound_connections: pool.values().filter(|c| c.component().is_some()).count(),
        }
    }
}

/// Removes a connection from its pool when the owning handler exits
pub struct PoolMembership {
    pool: Arc<ConnectionPool>,
    id: u64,
}

impl PoolMembership {
    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for PoolMembership {
    fn drop(&mut self) {
        if let Some(conn) = self.pool.remove(self.id) {
            conn.mark_inactive();
        }
    }
}
