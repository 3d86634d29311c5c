//! In-process registry of live connections.

use super::types::ConnectionHandle;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Maps a session identifier to its live connection handle.
///
/// Not a cache: entries live for the process lifetime unless explicitly
/// invalidated. At most one handle per identifier is registered at any time;
/// same-identifier creation is serialized by the session manager, so `put`
/// replacing an entry only happens after the old handle was invalidated.
#[derive(Default)]
pub struct ConnectionPool {
    entries: RwLock<HashMap<String, ConnectionHandle>>,
}

impl ConnectionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, session_id: &str) -> Option<ConnectionHandle> {
        self.entries.read().await.get(session_id).cloned()
    }

    /// Register a handle, replacing any prior entry for the identifier.
    pub async fn put(&self, session_id: &str, handle: ConnectionHandle) {
        let prior = self
            .entries
            .write()
            .await
            .insert(session_id.to_string(), handle);
        if prior.is_some() {
            debug!(session_id = %session_id, "replaced pooled connection");
        }
    }

    pub async fn invalidate(&self, session_id: &str) {
        if self.entries.write().await.remove(session_id).is_some() {
            debug!(session_id = %session_id, "invalidated pooled connection");
        }
    }

    pub async fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.entries.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
