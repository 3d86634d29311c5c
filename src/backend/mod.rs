//! Boundary to the remote messaging backend.
//!
//! The core never talks to a concrete MTProto client; it depends on the
//! object-safe traits below. Production deployments enable the `grammers`
//! feature, which supplies a connector backed by the grammers crates. Tests
//! inject scripted doubles.
//!
//! The two ways a connection can be established are expressed as a tagged
//! [`ConnectMode`] consumed by a single [`BackendConnector::connect`] path:
//! a fresh interactive login needs application API credentials, resumption
//! needs only a previously exported token.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[cfg(feature = "grammers")]
pub mod grammers;

/// Application-level API identity, needed only for a brand-new login.
#[derive(Debug, Clone)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

/// How a connection to the backend should be initialized.
#[derive(Debug, Clone)]
pub enum ConnectMode {
    /// Full interactive login path; requires application credentials.
    FreshLogin { credentials: ApiCredentials },
    /// Resume from a previously exported session token, no operator interaction.
    ResumeOnly { token: String },
}

/// Result of submitting a one-time login code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeOutcome {
    /// The code completed the login.
    Authenticated,
    /// The account has a second factor enabled; a password is required next.
    PasswordRequired,
}

/// One entry of the dialog (chat) list, flattened to a JSON-safe shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogInfo {
    pub id: i64,
    pub title: String,
    /// "user", "group" or "channel".
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_message: Option<String>,
}

/// One message, flattened to a JSON-safe shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageInfo {
    pub id: i32,
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    pub text: String,
    /// Epoch milliseconds.
    pub timestamp: i64,
}

/// Errors surfaced by the backend boundary.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("the login code was rejected")]
    InvalidCode,
    #[error("the password was rejected")]
    InvalidPassword,
    #[error("the connection is not authenticated")]
    NotAuthenticated,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("not supported: {0}")]
    NotSupported(String),
}

/// A live connection to the remote backend.
///
/// Login-dialog methods (`request_login_code`, `submit_code`,
/// `submit_password`) are only meaningful on a `FreshLogin` connection and
/// are driven by the authentication state machine; everything else requires
/// an authenticated connection.
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Whether the backend currently accepts this connection as authenticated.
    async fn is_authenticated(&self) -> Result<bool, BackendError>;

    /// Ask the backend to send a one-time code to the given identifier.
    async fn request_login_code(&self, identifier: &str) -> Result<(), BackendError>;

    /// Submit the one-time code the operator received.
    async fn submit_code(&self, code: &str) -> Result<CodeOutcome, BackendError>;

    /// Submit the second-factor password.
    async fn submit_password(&self, password: &str) -> Result<(), BackendError>;

    /// Invoke a raw protocol method by name.
    async fn invoke(&self, method: &str, params: Value) -> Result<Value, BackendError>;

    /// Fetch up to `limit` dialogs (most recent first).
    async fn fetch_dialogs(&self, limit: usize) -> Result<Vec<DialogInfo>, BackendError>;

    /// Fetch up to `limit` messages from one chat (most recent first).
    async fn fetch_messages(&self, chat_id: i64, limit: usize)
        -> Result<Vec<MessageInfo>, BackendError>;

    /// Send a text message to one chat.
    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageInfo, BackendError>;

    /// Export the opaque session token for persistence.
    async fn export_token(&self) -> Result<String, BackendError>;
}

/// Factory for backend connections. The single construction path for clients.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(&self, mode: ConnectMode) -> Result<Box<dyn BackendClient>, BackendError>;
}
