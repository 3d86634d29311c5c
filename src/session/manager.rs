//! Session manager: the single choke point for obtaining connectivity.

use crate::backend::{ApiCredentials, BackendConnector};
use crate::error::Error;
use crate::prompt::PromptMedium;
use crate::session::auth::AuthFlow;
use crate::session::pool::ConnectionPool;
use crate::session::types::{canonical_session_id, ConnectionHandle};
use crate::store::RecordStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Manager for multiple authenticated backend sessions.
///
/// Every command-scoped operation obtains its connection through
/// [`SessionManager::acquire`]; no other component creates connections.
pub struct SessionManager {
    store: Arc<RecordStore>,
    pool: Arc<ConnectionPool>,
    auth: AuthFlow,
    /// In-flight-attempt markers, one per identifier. A second concurrent
    /// caller for the same identifier awaits the in-flight attempt instead of
    /// starting a duplicate login dialog. Entries for distinct identifiers
    /// are independent locks.
    flights: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<RecordStore>,
        connector: Arc<dyn BackendConnector>,
        prompt: Arc<dyn PromptMedium>,
        credentials: Option<ApiCredentials>,
    ) -> Self {
        let pool = Arc::new(ConnectionPool::new());
        let auth = AuthFlow::new(connector, prompt, credentials, store.clone(), pool.clone());
        Self {
            store,
            pool,
            auth,
            flights: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Obtain the live connection for one session identifier, reusing a
    /// pooled handle, resuming from a persisted record, or driving the
    /// interactive login dialog, in that order.
    pub async fn acquire(&self, raw_id: &str) -> Result<ConnectionHandle, Error> {
        let session_id = canonical_session_id(raw_id)?;

        if let Some(handle) = self.checked_pool_hit(&session_id).await {
            return Ok(handle);
        }

        // Serialize same-identifier attempts; other identifiers proceed
        // independently on their own markers.
        let flight = {
            let mut flights = self.flights.lock().await;
            flights
                .entry(session_id.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let result = self.acquire_serialized(&session_id, &flight).await;

        // Prune the settled marker unless another caller is still waiting on
        // it. Holding the map lock keeps the count stable: waiters clone
        // their reference under that same lock.
        let mut flights = self.flights.lock().await;
        if let Some(entry) = flights.get(&session_id) {
            // Exactly the map's reference plus our local one.
            if Arc::strong_count(entry) == 2 {
                flights.remove(&session_id);
            }
        }
        drop(flights);

        result
    }

    async fn acquire_serialized(
        &self,
        session_id: &str,
        flight: &Arc<Mutex<()>>,
    ) -> Result<ConnectionHandle, Error> {
        let _in_flight = flight.lock().await;

        // An earlier caller may have settled the attempt while we waited.
        if let Some(handle) = self.checked_pool_hit(session_id).await {
            return Ok(handle);
        }

        let record = self.store.load(session_id).await?;
        debug!(
            session_id = %session_id,
            has_record = record.is_some(),
            "no pooled connection, authenticating"
        );
        self.auth.authenticate(session_id, record).await
    }

    #[cfg(test)]
    pub(crate) async fn in_flight_markers(&self) -> usize {
        self.flights.lock().await.len()
    }

    /// Pool lookup that verifies the handle still reports itself
    /// authenticated. A stale handle is invalidated, never silently reused.
    async fn checked_pool_hit(&self, session_id: &str) -> Option<ConnectionHandle> {
        let handle = self.pool.get(session_id).await?;
        match handle.client().is_authenticated().await {
            Ok(true) => Some(handle),
            Ok(false) => {
                warn!(session_id = %session_id, "pooled connection lost authentication, invalidating");
                self.pool.invalidate(session_id).await;
                None
            }
            Err(e) => {
                warn!(session_id = %session_id, error = %e, "pooled connection unusable, invalidating");
                self.pool.invalidate(session_id).await;
                None
            }
        }
    }
}
