//! Session-scoped types.

use crate::backend::BackendClient;
use crate::error::Error;
use std::sync::Arc;

/// A live, authenticated connection to the remote backend.
///
/// Owned exclusively by the connection pool entry for its identifier; callers
/// hold it through the shared [`ConnectionHandle`].
pub struct Connection {
    session_id: String,
    client: Box<dyn BackendClient>,
}

/// Shared reference to a pooled connection.
pub type ConnectionHandle = Arc<Connection>;

impl Connection {
    pub fn new(session_id: impl Into<String>, client: Box<dyn BackendClient>) -> Self {
        Self {
            session_id: session_id.into(),
            client,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn client(&self) -> &dyn BackendClient {
        self.client.as_ref()
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("session_id", &self.session_id)
            .finish_non_exhaustive()
    }
}

/// Stage of one interactive login dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoginStage {
    AwaitingCode,
    AwaitingPassword,
}

impl std::fmt::Display for LoginStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoginStage::AwaitingCode => write!(f, "awaiting_code"),
            LoginStage::AwaitingPassword => write!(f, "awaiting_password"),
        }
    }
}

/// Transient bookkeeping for one login dialog. Never persisted.
#[derive(Debug)]
pub(crate) struct LoginAttempt {
    pub session_id: String,
    pub stage: LoginStage,
    pub password_attempts: u32,
}

impl LoginAttempt {
    pub fn new(session_id: &str) -> Self {
        Self {
            session_id: session_id.to_string(),
            stage: LoginStage::AwaitingCode,
            password_attempts: 0,
        }
    }
}

/// Canonical form of a session identifier.
///
/// Identifiers are conventionally international phone numbers; operator input
/// varies in formatting ("+1 (555) 010-2000"), so one rule is applied
/// uniformly before the identifier is used as pool key or store file stem:
/// phone separators are stripped, a leading `+` is preserved, and the result
/// must consist only of ASCII alphanumerics, `_` and that leading `+`.
pub fn canonical_session_id(raw: &str) -> Result<String, Error> {
    let trimmed = raw.trim();
    let mut out = String::with_capacity(trimmed.len());
    for c in trimmed.chars() {
        match c {
            ' ' | '-' | '.' | '(' | ')' => continue,
            '+' if out.is_empty() => out.push(c),
            c if c.is_ascii_alphanumeric() || c == '_' => out.push(c),
            c => {
                return Err(Error::InvalidParams(format!(
                    "invalid character {c:?} in session identifier {trimmed:?}"
                )))
            }
        }
    }
    if out.is_empty() || out == "+" {
        return Err(Error::InvalidParams(format!(
            "empty session identifier {raw:?}"
        )));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalization_strips_phone_separators() {
        assert_eq!(canonical_session_id("+1 (555) 010-2000").unwrap(), "+15550102000");
        assert_eq!(canonical_session_id(" +1000 ").unwrap(), "+1000");
        assert_eq!(canonical_session_id("work_account").unwrap(), "work_account");
    }

    #[test]
    fn canonicalization_rejects_unsafe_identifiers() {
        assert!(canonical_session_id("../etc/passwd").is_err());
        assert!(canonical_session_id("").is_err());
        assert!(canonical_session_id("+").is_err());
        assert!(canonical_session_id("a+b").is_err());
    }
}
