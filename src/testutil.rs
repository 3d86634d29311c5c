//! Scripted doubles for the backend and prompt boundaries.

use crate::backend::{
    BackendClient, BackendConnector, BackendError, CodeOutcome, ConnectMode, DialogInfo,
    MessageInfo,
};
use crate::error::Error;
use crate::prompt::PromptMedium;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct FakeState {
    /// Tokens the backend will accept for resumption.
    accepted: Mutex<HashSet<String>>,
    /// Expected one-time code for interactive logins.
    code: Mutex<Option<String>>,
    /// Expected second-factor password; `None` means 2FA is disabled.
    password: Mutex<Option<String>>,
    fail_transport: AtomicBool,
    connect_delay: Mutex<Option<Duration>>,
    connect_count: AtomicUsize,
    login_code_requests: AtomicUsize,
    token_counter: AtomicUsize,
    last_dialog_limit: AtomicUsize,
    last_message_limit: AtomicUsize,
    clients: Mutex<Vec<Arc<ClientState>>>,
}

struct ClientState {
    authed: AtomicBool,
    token: Mutex<Option<String>>,
}

/// Backend double whose behavior is configured up front.
#[derive(Default)]
pub struct FakeConnector {
    state: Arc<FakeState>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_accepted_token(self, token: &str) -> Self {
        self.state.accepted.lock().unwrap().insert(token.to_string());
        self
    }

    pub fn with_code(self, code: &str) -> Self {
        *self.state.code.lock().unwrap() = Some(code.to_string());
        self
    }

    pub fn with_password(self, password: &str) -> Self {
        *self.state.password.lock().unwrap() = Some(password.to_string());
        self
    }

    pub fn with_transport_failure(self) -> Self {
        self.state.fail_transport.store(true, Ordering::SeqCst);
        self
    }

    pub fn with_connect_delay(self, delay: Duration) -> Self {
        *self.state.connect_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn connect_count(&self) -> usize {
        self.state.connect_count.load(Ordering::SeqCst)
    }

    pub fn login_code_requests(&self) -> usize {
        self.state.login_code_requests.load(Ordering::SeqCst)
    }

    pub fn last_dialog_limit(&self) -> usize {
        self.state.last_dialog_limit.load(Ordering::SeqCst)
    }

    pub fn last_message_limit(&self) -> usize {
        self.state.last_message_limit.load(Ordering::SeqCst)
    }

    /// Flip every live connection to unauthenticated, as the backend does
    /// when a session is revoked remotely. Saved tokens stay accepted.
    pub fn deauthenticate_all(&self) {
        for client in self.state.clients.lock().unwrap().iter() {
            client.authed.store(false, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl BackendConnector for FakeConnector {
    async fn connect(&self, mode: ConnectMode) -> Result<Box<dyn BackendClient>, BackendError> {
        if self.state.fail_transport.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("fake transport down".into()));
        }
        let delay = *self.state.connect_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.state.connect_count.fetch_add(1, Ordering::SeqCst);

        let client_state = match mode {
            ConnectMode::ResumeOnly { token } => {
                let accepted = self.state.accepted.lock().unwrap().contains(&token);
                Arc::new(ClientState {
                    authed: AtomicBool::new(accepted),
                    token: Mutex::new(accepted.then_some(token)),
                })
            }
            ConnectMode::FreshLogin { .. } => Arc::new(ClientState {
                authed: AtomicBool::new(false),
                token: Mutex::new(None),
            }),
        };
        self.state.clients.lock().unwrap().push(client_state.clone());
        Ok(Box::new(FakeClient {
            shared: self.state.clone(),
            state: client_state,
        }))
    }
}

struct FakeClient {
    shared: Arc<FakeState>,
    state: Arc<ClientState>,
}

impl FakeClient {
    fn mint_token(&self) {
        let n = self.shared.token_counter.fetch_add(1, Ordering::SeqCst);
        let token = format!("tok-{n}");
        self.shared.accepted.lock().unwrap().insert(token.clone());
        *self.state.token.lock().unwrap() = Some(token);
        self.state.authed.store(true, Ordering::SeqCst);
    }

    fn require_auth(&self) -> Result<(), BackendError> {
        if self.state.authed.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(BackendError::NotAuthenticated)
        }
    }
}

#[async_trait]
impl BackendClient for FakeClient {
    async fn is_authenticated(&self) -> Result<bool, BackendError> {
        Ok(self.state.authed.load(Ordering::SeqCst))
    }

    async fn request_login_code(&self, _identifier: &str) -> Result<(), BackendError> {
        self.shared.login_code_requests.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn submit_code(&self, code: &str) -> Result<CodeOutcome, BackendError> {
        let expected = self.shared.code.lock().unwrap().clone();
        match expected {
            Some(expected) if expected == code => {
                if self.shared.password.lock().unwrap().is_some() {
                    Ok(CodeOutcome::PasswordRequired)
                } else {
                    self.mint_token();
                    Ok(CodeOutcome::Authenticated)
                }
            }
            _ => Err(BackendError::InvalidCode),
        }
    }

    async fn submit_password(&self, password: &str) -> Result<(), BackendError> {
        let expected = self.shared.password.lock().unwrap().clone();
        match expected {
            Some(expected) if expected == password => {
                self.mint_token();
                Ok(())
            }
            _ => Err(BackendError::InvalidPassword),
        }
    }

    async fn invoke(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        self.require_auth()?;
        Ok(json!({ "method": method, "params": params }))
    }

    async fn fetch_dialogs(&self, limit: usize) -> Result<Vec<DialogInfo>, BackendError> {
        self.require_auth()?;
        self.shared.last_dialog_limit.store(limit, Ordering::SeqCst);
        Ok(vec![DialogInfo {
            id: 1,
            title: "Saved Messages".into(),
            kind: "user".into(),
            last_message: Some("hi".into()),
        }])
    }

    async fn fetch_messages(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> Result<Vec<MessageInfo>, BackendError> {
        self.require_auth()?;
        self.shared.last_message_limit.store(limit, Ordering::SeqCst);
        Ok(vec![MessageInfo {
            id: 7,
            chat_id,
            sender: Some("alice".into()),
            text: "hello".into(),
            timestamp: 1_700_000_000_000,
        }])
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<MessageInfo, BackendError> {
        self.require_auth()?;
        Ok(MessageInfo {
            id: 8,
            chat_id,
            sender: None,
            text: text.to_string(),
            timestamp: 1_700_000_000_001,
        })
    }

    async fn export_token(&self) -> Result<String, BackendError> {
        self.state
            .token
            .lock()
            .unwrap()
            .clone()
            .ok_or(BackendError::NotAuthenticated)
    }
}

/// Prompt double that replays a fixed script of answers.
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
    asked: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new(answers: &[&str]) -> Self {
        Self {
            answers: Mutex::new(answers.iter().map(|s| s.to_string()).collect()),
            asked: AtomicUsize::new(0),
        }
    }

    /// Number of prompts the flow actually issued.
    pub fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PromptMedium for ScriptedPrompt {
    async fn request_text(&self, label: &str) -> Result<String, Error> {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answers
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::Prompt(format!("script exhausted at prompt {label:?}")))
    }
}

/// Prompt double that derives answers from the label and records the order
/// prompts were issued in. The per-prompt delay widens the window in which
/// concurrent login dialogs could interleave their prompts.
pub struct RecordingPrompt {
    code: String,
    delay: Duration,
    labels: Mutex<Vec<String>>,
}

impl RecordingPrompt {
    pub fn new(code: &str, delay: Duration) -> Self {
        Self {
            code: code.to_string(),
            delay,
            labels: Mutex::new(Vec::new()),
        }
    }

    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }
}

#[async_trait]
impl PromptMedium for RecordingPrompt {
    async fn request_text(&self, label: &str) -> Result<String, Error> {
        self.labels.lock().unwrap().push(label.to_string());
        tokio::time::sleep(self.delay).await;
        if label.contains("identifier") {
            Ok(String::new())
        } else {
            Ok(self.code.clone())
        }
    }
}
