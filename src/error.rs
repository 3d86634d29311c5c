//! Error types for the Telegram MCP server.
//!
//! Command execution failures are returned as structured data at the dispatch
//! boundary, while protocol errors (malformed MCP frames) are handled by rmcp.

use crate::backend::BackendError;
use serde::Serialize;
use thiserror::Error;

/// Failure classification surfaced to callers in `CommandResult` failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No API credentials configured and no usable saved session. Fatal, not retried.
    MissingCredentials,
    /// The one-time login code was rejected. The login dialog retries the same stage.
    InvalidCode,
    /// The second-factor password was rejected.
    InvalidPassword,
    /// Too many consecutive second-factor failures for one login dialog.
    AuthExhausted,
    /// Connection-level fault talking to the remote backend.
    TransportFailure,
    /// Schema validation failure; recoverable by resubmitting.
    InvalidParameters,
    /// Unknown command name or missing session record.
    NotFound,
    /// Authentication could not be completed for this request.
    SessionUnavailable,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingCredentials => "missing_credentials",
            Self::InvalidCode => "invalid_code",
            Self::InvalidPassword => "invalid_password",
            Self::AuthExhausted => "auth_exhausted",
            Self::TransportFailure => "transport_failure",
            Self::InvalidParameters => "invalid_parameters",
            Self::NotFound => "not_found",
            Self::SessionUnavailable => "session_unavailable",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised below the command dispatcher.
#[derive(Error, Debug)]
pub enum Error {
    #[error("no API credentials are configured and no usable saved session exists")]
    MissingCredentials,

    #[error("the one-time login code was rejected")]
    InvalidCode,

    #[error("the second-factor password was rejected")]
    InvalidPassword,

    #[error("authentication abandoned after {0} failed password attempts")]
    AuthExhausted(u32),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    #[error("unknown command: {0}")]
    UnknownCommand(String),

    #[error("session unavailable for {session}: {reason}")]
    SessionUnavailable { session: String, reason: String },

    #[error("session store error: {0}")]
    Store(String),

    #[error("interactive prompt unavailable: {0}")]
    Prompt(String),

    #[error("not supported by the connected backend: {0}")]
    NotSupported(String),
}

impl Error {
    /// Classification used when the error crosses the dispatch boundary.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::MissingCredentials => ErrorKind::MissingCredentials,
            Error::InvalidCode => ErrorKind::InvalidCode,
            Error::InvalidPassword => ErrorKind::InvalidPassword,
            Error::AuthExhausted(_) => ErrorKind::AuthExhausted,
            Error::Transport(_) => ErrorKind::TransportFailure,
            Error::InvalidParams(_) | Error::NotSupported(_) => ErrorKind::InvalidParameters,
            Error::UnknownCommand(_) => ErrorKind::NotFound,
            Error::SessionUnavailable { .. } | Error::Prompt(_) => ErrorKind::SessionUnavailable,
            Error::Store(_) => ErrorKind::SessionUnavailable,
        }
    }
}

impl From<BackendError> for Error {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::InvalidCode => Error::InvalidCode,
            BackendError::InvalidPassword => Error::InvalidPassword,
            BackendError::NotAuthenticated => Error::Transport(
                "backend reports the connection is no longer authenticated".into(),
            ),
            BackendError::Transport(msg) => Error::Transport(msg),
            BackendError::NotSupported(msg) => Error::NotSupported(msg),
        }
    }
}
