//! Production backend built on the grammers MTProto client.
//!
//! Enabled with the `grammers` feature. Session tokens are the raw grammers
//! session bytes, base64-encoded so they fit the JSON record format.

use super::{
    ApiCredentials, BackendClient, BackendConnector, BackendError, CodeOutcome, ConnectMode,
    DialogInfo, MessageInfo,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use grammers_client::types::{Chat, LoginToken, PasswordToken};
use grammers_client::{Client, Config, InitParams, SignInError};
use grammers_session::Session;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;

fn transport(e: impl std::fmt::Display) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// Connector that opens MTProto connections via grammers.
///
/// grammers needs application credentials to initialize a connection even
/// when resuming from saved session bytes, so the connector keeps a copy for
/// the resume path; fresh logins carry their own in [`ConnectMode`].
pub struct GrammersConnector {
    credentials: Option<ApiCredentials>,
}

impl GrammersConnector {
    pub fn new(credentials: Option<ApiCredentials>) -> Self {
        Self { credentials }
    }
}

#[async_trait]
impl BackendConnector for GrammersConnector {
    async fn connect(&self, mode: ConnectMode) -> Result<Box<dyn BackendClient>, BackendError> {
        let (session, credentials) = match mode {
            ConnectMode::FreshLogin { credentials } => (Session::new(), credentials),
            ConnectMode::ResumeOnly { token } => {
                let credentials = self.credentials.clone().ok_or_else(|| {
                    BackendError::Transport(
                        "resuming a grammers session requires API credentials".into(),
                    )
                })?;
                let bytes = BASE64
                    .decode(&token)
                    .map_err(|e| transport(format!("session token is not valid base64: {e}")))?;
                let session = Session::load(&bytes)
                    .map_err(|e| transport(format!("session token did not parse: {e}")))?;
                (session, credentials)
            }
        };

        debug!(api_id = credentials.api_id, "connecting to Telegram");
        let client = Client::connect(Config {
            session,
            api_id: credentials.api_id,
            api_hash: credentials.api_hash,
            params: InitParams::default(),
        })
        .await
        .map_err(transport)?;

        Ok(Box::new(GrammersClient {
            client,
            login: Mutex::new(LoginState::default()),
        }))
    }
}

/// Server-side login state carried between the code and password steps.
#[derive(Default)]
struct LoginState {
    code_token: Option<LoginToken>,
    password_token: Option<PasswordToken>,
}

struct GrammersClient {
    client: Client,
    login: Mutex<LoginState>,
}

impl GrammersClient {
    /// grammers addresses chats by packed (id, access hash) pairs, not bare
    /// ids, so a bare id is resolved through the dialog list.
    async fn resolve_chat(&self, chat_id: i64) -> Result<Chat, BackendError> {
        let mut dialogs = self.client.iter_dialogs();
        while let Some(dialog) = dialogs.next().await.map_err(transport)? {
            if dialog.chat().id() == chat_id {
                return Ok(dialog.chat().clone());
            }
        }
        Err(BackendError::Transport(format!(
            "chat {chat_id} not found among this session's dialogs"
        )))
    }
}

fn chat_kind(chat: &Chat) -> &'static str {
    match chat {
        Chat::User(_) => "user",
        Chat::Group(_) => "group",
        Chat::Channel(_) => "channel",
    }
}

#[async_trait]
impl BackendClient for GrammersClient {
    async fn is_authenticated(&self) -> Result<bool, BackendError> {
        self.client.is_authorized().await.map_err(transport)
    }

    async fn request_login_code(&self, identifier: &str) -> Result<(), BackendError> {
        let token = self
            .client
            .request_login_code(identifier)
            .await
            .map_err(transport)?;
        self.login.lock().await.code_token = Some(token);
        Ok(())
    }

    async fn submit_code(&self, code: &str) -> Result<CodeOutcome, BackendError> {
        let mut login = self.login.lock().await;
        let token = login.code_token.as_ref().ok_or_else(|| {
            BackendError::Transport("no login code was requested on this connection".into())
        })?;
        match self.client.sign_in(token, code).await {
            Ok(_user) => {
                login.code_token = None;
                Ok(CodeOutcome::Authenticated)
            }
            Err(SignInError::PasswordRequired(password_token)) => {
                login.code_token = None;
                login.password_token = Some(password_token);
                Ok(CodeOutcome::PasswordRequired)
            }
            Err(SignInError::InvalidCode) => Err(BackendError::InvalidCode),
            Err(e) => Err(transport(e)),
        }
    }

    async fn submit_password(&self, password: &str) -> Result<(), BackendError> {
        // A check consumes the SRP state; a failed attempt therefore needs a
        // fresh login dialog rather than an immediate resubmit.
        let token = self.login.lock().await.password_token.take().ok_or_else(|| {
            BackendError::Transport("no second-factor challenge is pending on this connection".into())
        })?;
        match self.client.check_password(token, password).await {
            Ok(_user) => Ok(()),
            Err(SignInError::InvalidPassword) => Err(BackendError::InvalidPassword),
            Err(e) => Err(transport(e)),
        }
    }

    async fn invoke(&self, method: &str, _params: Value) -> Result<Value, BackendError> {
        // grammers only exposes statically typed TL requests; there is no
        // dynamic invoke-by-name path.
        Err(BackendError::NotSupported(format!(
            "raw method invocation ({method}) is not supported by the grammers backend"
        )))
    }

    async fn fetch_dialogs(&self, limit: usize) -> Result<Vec<DialogInfo>, BackendError> {
        let mut dialogs = self.client.iter_dialogs().limit(limit);
        let mut out = Vec::new();
        while let Some(dialog) = dialogs.next().await.map_err(transport)? {
            let chat = dialog.chat();
            out.push(DialogInfo {
                id: chat.id(),
                title: chat.name().to_string(),
                kind: chat_kind(chat).to_string(),
                last_message: dialog.last_message.as_ref().map(|m| m.text().to_string()),
            });
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn fetch_messages(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> Result<Vec<MessageInfo>, BackendError> {
        let chat = self.resolve_chat(chat_id).await?;
        let mut messages = self.client.iter_messages(chat.pack()).limit(limit);
        let mut out = Vec::new();
        while let Some(message) = messages.next().await.map_err(transport)? {
            out.push(MessageInfo {
                id: message.id(),
                chat_id,
                sender: message.sender().map(|s| s.name().to_string()),
                text: message.text().to_string(),
                timestamp: message.date().timestamp_millis(),
            });
            if out.len() >= limit {
                break;
            }
        }
        Ok(out)
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageInfo, BackendError> {
        let chat = self.resolve_chat(chat_id).await?;
        let message = self
            .client
            .send_message(chat.pack(), text)
            .await
            .map_err(transport)?;
        Ok(MessageInfo {
            id: message.id(),
            chat_id,
            sender: None,
            text: text.to_string(),
            timestamp: message.date().timestamp_millis(),
        })
    }

    async fn export_token(&self) -> Result<String, BackendError> {
        Ok(BASE64.encode(self.client.session().save()))
    }
}
