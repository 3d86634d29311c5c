//! Startup reconciliation of persisted session records.
//!
//! Runs once at process start, before command handling is advertised as
//! ready: enumerates persisted records, reports the structurally valid ones,
//! and optionally exercises the first against the remote backend under a
//! wall-clock bound. Reconciliation never fails the startup.

use crate::session::manager::SessionManager;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct ReconcileOptions {
    /// Exercise one persisted record against the backend.
    pub probe: bool,
    /// Wall-clock bound for the probe so startup cannot hang on a dead DC.
    pub probe_timeout: Duration,
}

impl Default for ReconcileOptions {
    fn default() -> Self {
        Self {
            probe: false,
            probe_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ProbeOutcome {
    Resumed { session: String },
    Failed { session: String, error: String },
    TimedOut { session: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    /// Identifiers with a structurally valid persisted record.
    pub sessions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probe: Option<ProbeOutcome>,
}

pub async fn reconcile(
    manager: &Arc<SessionManager>,
    options: &ReconcileOptions,
) -> ReconcileReport {
    let sessions = match manager.store().list_valid().await {
        Ok(sessions) => sessions,
        Err(e) => {
            warn!(error = %e, "session record scan failed, continuing with no records");
            Vec::new()
        }
    };
    info!(
        count = sessions.len(),
        dir = %manager.store().dir().display(),
        "reconciled persisted session records"
    );

    let probe = if options.probe {
        sessions.first().cloned()
    } else {
        None
    };

    let probe = match probe {
        None => None,
        Some(session) => {
            info!(session_id = %session, "probing persisted session against the backend");
            // The attempt runs on its own task: the timeout below stops the
            // wait, it must not cancel an authentication that still owns the
            // identifier's in-flight marker.
            let attempt = tokio::spawn({
                let manager = manager.clone();
                let session = session.clone();
                async move { manager.acquire(&session).await }
            });
            let outcome = match timeout(options.probe_timeout, attempt).await {
                Ok(Ok(Ok(_handle))) => ProbeOutcome::Resumed {
                    session: session.clone(),
                },
                Ok(Ok(Err(e))) => {
                    warn!(session_id = %session, error = %e, "startup probe failed");
                    ProbeOutcome::Failed {
                        session: session.clone(),
                        error: e.to_string(),
                    }
                }
                Ok(Err(e)) => {
                    warn!(session_id = %session, error = %e, "startup probe task failed");
                    ProbeOutcome::Failed {
                        session: session.clone(),
                        error: e.to_string(),
                    }
                }
                Err(_) => {
                    // The attempt keeps running in the background and settles
                    // on its own; startup merely stops waiting for it.
                    warn!(session_id = %session, "startup probe timed out");
                    ProbeOutcome::TimedOut { session }
                }
            };
            Some(outcome)
        }
    };

    ReconcileReport { sessions, probe }
}
