//! Interactive multi-factor authentication state machine.
//!
//! Given a session identifier and, if available, a persisted token, produces
//! an authenticated connection:
//!
//! ```text
//! Start ─▶ TryResume ─▶ Authenticated
//!              │
//!              ▼
//!    NeedsInteractiveLogin ─▶ AwaitingCode ─▶ Authenticated
//!                                  │  ▲ │
//!                    (invalid code)└──┘ ▼
//!                             AwaitingPassword ─▶ Authenticated
//!                                  │  ▲
//!                 (invalid, < 3)   └──┘
//!                 (3 failures) ─▶ Failed(AuthExhausted)
//! ```
//!
//! Resumption is attempted before any interactive step so that a valid
//! persisted token keeps the system operational when no application
//! credentials are configured. On success the new token is persisted exactly
//! once and the handle registered in the pool; on failure nothing is written.

use crate::backend::{
    ApiCredentials, BackendClient, BackendConnector, BackendError, CodeOutcome, ConnectMode,
};
use crate::error::Error;
use crate::prompt::PromptMedium;
use crate::session::pool::ConnectionPool;
use crate::session::types::{Connection, ConnectionHandle, LoginAttempt, LoginStage};
use crate::store::{RecordStore, SessionRecord};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Total second-factor attempts allowed per login dialog.
const MAX_PASSWORD_ATTEMPTS: u32 = 3;

pub struct AuthFlow {
    connector: Arc<dyn BackendConnector>,
    prompt: Arc<dyn PromptMedium>,
    credentials: Option<ApiCredentials>,
    store: Arc<RecordStore>,
    pool: Arc<ConnectionPool>,
    /// The prompt medium is a single shared console: one login dialog may ask
    /// for operator input at a time, process-wide.
    console_gate: Mutex<()>,
}

impl AuthFlow {
    pub fn new(
        connector: Arc<dyn BackendConnector>,
        prompt: Arc<dyn PromptMedium>,
        credentials: Option<ApiCredentials>,
        store: Arc<RecordStore>,
        pool: Arc<ConnectionPool>,
    ) -> Self {
        Self {
            connector,
            prompt,
            credentials,
            store,
            pool,
            console_gate: Mutex::new(()),
        }
    }

    /// Drive the state machine to an authenticated, pooled connection.
    pub async fn authenticate(
        &self,
        session_id: &str,
        record: Option<SessionRecord>,
    ) -> Result<ConnectionHandle, Error> {
        if let Some(record) = record {
            debug!(session_id = %session_id, "attempting resumption with saved token");
            match self.try_resume(session_id, &record.token).await {
                Ok(Some(handle)) => {
                    info!(session_id = %session_id, "session resumed without interactive login");
                    return Ok(handle);
                }
                Ok(None) => {
                    warn!(session_id = %session_id, "saved token no longer accepted by the backend");
                    // Fall through to interactive login below when possible.
                }
                Err(e) => {
                    // Transport-level resume failure: distinct from a
                    // credential problem. Only retry interactively when an
                    // interactive path is even possible.
                    if self.credentials.is_none() {
                        return Err(e);
                    }
                    warn!(session_id = %session_id, error = %e, "resumption failed; falling back to interactive login");
                }
            }
        }

        let Some(credentials) = self.credentials.clone() else {
            return Err(Error::MissingCredentials);
        };

        let _console = self.console_gate.lock().await;
        self.interactive_login(session_id, credentials).await
    }

    /// `TryResume`: establish a connection with the token alone.
    ///
    /// `Ok(None)` means the backend rejected the token as unauthenticated;
    /// `Err` means the attempt failed for a reason unrelated to credentials.
    async fn try_resume(
        &self,
        session_id: &str,
        token: &str,
    ) -> Result<Option<ConnectionHandle>, Error> {
        let client = self
            .connector
            .connect(ConnectMode::ResumeOnly {
                token: token.to_string(),
            })
            .await
            .map_err(Error::from)?;

        if client.is_authenticated().await.map_err(Error::from)? {
            Ok(Some(self.finish(session_id, client).await?))
        } else {
            Ok(None)
        }
    }

    /// Drive the interactive code/password dialog on a fresh connection.
    async fn interactive_login(
        &self,
        session_id: &str,
        credentials: ApiCredentials,
    ) -> Result<ConnectionHandle, Error> {
        info!(session_id = %session_id, "starting interactive login");
        let client = self
            .connector
            .connect(ConnectMode::FreshLogin { credentials })
            .await
            .map_err(Error::from)?;

        let answer = self
            .prompt
            .request_text(&format!(
                "Login identifier [{session_id}] (press Enter to keep)"
            ))
            .await?;
        let identifier = if answer.trim().is_empty() {
            session_id.to_string()
        } else {
            answer.trim().to_string()
        };

        client
            .request_login_code(&identifier)
            .await
            .map_err(Error::from)?;

        let mut attempt = LoginAttempt::new(session_id);

        // AwaitingCode: an invalid code retries the same stage and never
        // consumes a password attempt.
        loop {
            debug!(session_id = %attempt.session_id, stage = %attempt.stage, "awaiting operator input");
            let code = self
                .prompt
                .request_text(&format!("Enter the login code sent to {identifier}"))
                .await?;
            match client.submit_code(code.trim()).await {
                Ok(CodeOutcome::Authenticated) => {
                    return self.finish(session_id, client).await;
                }
                Ok(CodeOutcome::PasswordRequired) => {
                    attempt.stage = LoginStage::AwaitingPassword;
                    break;
                }
                Err(BackendError::InvalidCode) => {
                    warn!(session_id = %session_id, "login code rejected, asking again");
                }
                Err(e) => return Err(e.into()),
            }
        }

        // AwaitingPassword: bounded to MAX_PASSWORD_ATTEMPTS total.
        loop {
            debug!(
                session_id = %attempt.session_id,
                stage = %attempt.stage,
                attempts = attempt.password_attempts,
                "awaiting operator input"
            );
            let password = self
                .prompt
                .request_text("Enter the two-factor password")
                .await?;
            match client.submit_password(&password).await {
                Ok(()) => return self.finish(session_id, client).await,
                Err(BackendError::InvalidPassword) => {
                    attempt.password_attempts += 1;
                    if attempt.password_attempts >= MAX_PASSWORD_ATTEMPTS {
                        warn!(session_id = %session_id, "second factor exhausted");
                        return Err(Error::AuthExhausted(MAX_PASSWORD_ATTEMPTS));
                    }
                    warn!(
                        session_id = %session_id,
                        attempts = attempt.password_attempts,
                        "password rejected, asking again"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// `Authenticated`: persist the token exactly once, register the handle.
    async fn finish(
        &self,
        session_id: &str,
        client: Box<dyn BackendClient>,
    ) -> Result<ConnectionHandle, Error> {
        let token = client.export_token().await.map_err(Error::from)?;
        self.store.save(session_id, &token).await?;
        let handle = Arc::new(Connection::new(session_id, client));
        self.pool.put(session_id, handle.clone()).await;
        Ok(handle)
    }
}
