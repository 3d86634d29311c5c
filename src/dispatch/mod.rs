//! Command dispatch: the one validation and routing path for external
//! requests.
//!
//! Front-end adapters (the MCP server, the CLI) translate their transport's
//! request shape into a [`CommandRequest`] and hand it to
//! [`CommandDispatcher::dispatch`]; every failure below this boundary comes
//! back as a structured [`CommandResult`] failure, never as an uncaught
//! fault.

mod requests;

pub use requests::*;

use crate::error::{Error, ErrorKind};
use crate::session::SessionManager;
use schemars::{schema_for, JsonSchema};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::debug;

/// Metadata for a single command.
#[derive(Debug, Clone)]
pub struct CommandInfo {
    pub name: &'static str,
    pub description: &'static str,
    /// Example invocation (JSON).
    pub example: &'static str,
}

/// Static registry of the supported command surface.
pub static COMMAND_REGISTRY: &[CommandInfo] = &[
    CommandInfo {
        name: "getDialogs",
        description: "List the most recent dialogs (chats) for one session. \
                      Requires a session identifier; the session is resumed from \
                      its saved token or logged in interactively on first use.",
        example: r#"{"session": "+15550102000", "limit": 50}"#,
    },
    CommandInfo {
        name: "getMessages",
        description: "Fetch the most recent messages from one chat. \
                      chatId is the numeric identifier returned by getDialogs.",
        example: r#"{"session": "+15550102000", "chatId": 133742, "limit": 20}"#,
    },
    CommandInfo {
        name: "sendMessage",
        description: "Send a text message to one chat on behalf of the session's identity.",
        example: r#"{"session": "+15550102000", "chatId": 133742, "message": "hello"}"#,
    },
    CommandInfo {
        name: "executeMethod",
        description: "Invoke a raw protocol method by name with a JSON parameter object. \
                      Availability depends on the connected backend.",
        example: r#"{"session": "+15550102000", "method": "help.getConfig", "params": {}}"#,
    },
];

pub fn get_command(name: &str) -> Option<&'static CommandInfo> {
    COMMAND_REGISTRY.iter().find(|c| c.name == name)
}

/// JSON schema for one command's parameter object.
pub fn command_schema(name: &str) -> Option<Map<String, Value>> {
    fn schema<T: JsonSchema>() -> Option<Map<String, Value>> {
        serde_json::to_value(schema_for!(T))
            .ok()
            .and_then(|v| v.as_object().cloned())
    }

    match name {
        "getDialogs" => schema::<GetDialogsRequest>(),
        "getMessages" => schema::<GetMessagesRequest>(),
        "sendMessage" => schema::<SendMessageRequest>(),
        "executeMethod" => schema::<ExecuteMethodRequest>(),
        _ => None,
    }
}

/// An externally supplied, untrusted command invocation.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    pub name: String,
    pub parameters: Map<String, Value>,
}

/// Structured failure half of a [`CommandResult`].
#[derive(Debug, Clone, Serialize)]
pub struct CommandFailure {
    #[serde(rename = "errorKind")]
    pub kind: ErrorKind,
    pub message: String,
}

/// Outcome of one dispatch: a JSON-safe payload or a structured failure.
#[derive(Debug, Clone)]
pub enum CommandResult {
    Success(Value),
    Failure(CommandFailure),
}

impl CommandResult {
    pub fn success(payload: Value) -> Self {
        CommandResult::Success(payload)
    }

    pub fn failure(error: &Error) -> Self {
        CommandResult::Failure(CommandFailure {
            kind: error.kind(),
            message: error.to_string(),
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, CommandResult::Success(_))
    }

    pub fn failure_kind(&self) -> Option<ErrorKind> {
        match self {
            CommandResult::Success(_) => None,
            CommandResult::Failure(f) => Some(f.kind),
        }
    }
}

/// Validates and routes command requests to session-scoped operations.
pub struct CommandDispatcher {
    sessions: Arc<SessionManager>,
}

impl CommandDispatcher {
    pub fn new(sessions: Arc<SessionManager>) -> Self {
        Self { sessions }
    }

    pub async fn dispatch(&self, request: CommandRequest) -> CommandResult {
        debug!(command = %request.name, "dispatching command");
        let result = match request.name.as_str() {
            "getDialogs" => self.get_dialogs(request.parameters).await,
            "getMessages" => self.get_messages(request.parameters).await,
            "sendMessage" => self.send_message(request.parameters).await,
            "executeMethod" => self.execute_method(request.parameters).await,
            other => Err(Error::UnknownCommand(other.to_string())),
        };
        match result {
            Ok(payload) => CommandResult::success(payload),
            Err(e) => {
                debug!(command = %request.name, error = %e, kind = %e.kind(), "command failed");
                CommandResult::failure(&e)
            }
        }
    }

    async fn get_dialogs(&self, parameters: Map<String, Value>) -> Result<Value, Error> {
        let req: GetDialogsRequest = parse(parameters)?;
        let handle = self.acquire(&req.session).await?;
        let dialogs = handle
            .client()
            .fetch_dialogs(req.limit)
            .await
            .map_err(Error::from)?;
        let count = dialogs.len();
        Ok(json!({ "dialogs": dialogs, "count": count }))
    }

    async fn get_messages(&self, parameters: Map<String, Value>) -> Result<Value, Error> {
        let req: GetMessagesRequest = parse(parameters)?;
        let handle = self.acquire(&req.session).await?;
        let messages = handle
            .client()
            .fetch_messages(req.chat_id, req.limit)
            .await
            .map_err(Error::from)?;
        Ok(json!({ "chatId": req.chat_id, "messages": messages }))
    }

    async fn send_message(&self, parameters: Map<String, Value>) -> Result<Value, Error> {
        let req: SendMessageRequest = parse(parameters)?;
        let handle = self.acquire(&req.session).await?;
        let sent = handle
            .client()
            .send_message(req.chat_id, &req.message)
            .await
            .map_err(Error::from)?;
        Ok(json!({ "sent": sent }))
    }

    async fn execute_method(&self, parameters: Map<String, Value>) -> Result<Value, Error> {
        let req: ExecuteMethodRequest = parse(parameters)?;
        let handle = self.acquire(&req.session).await?;
        let result = handle
            .client()
            .invoke(&req.method, Value::Object(req.params))
            .await
            .map_err(Error::from)?;
        Ok(json!({ "method": req.method, "result": result }))
    }

    /// Acquire failures are reported as `SessionUnavailable`, carrying the
    /// underlying cause in the message.
    async fn acquire(&self, session: &str) -> Result<crate::session::ConnectionHandle, Error> {
        match self.sessions.acquire(session).await {
            Ok(handle) => Ok(handle),
            // Parameter-shaped problems (a malformed identifier) stay
            // InvalidParameters so callers know resubmitting can help.
            Err(e @ Error::InvalidParams(_)) => Err(e),
            Err(e) => Err(Error::SessionUnavailable {
                session: session.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Validate the untrusted parameter object against the command's declared
/// schema by deserializing into the typed request struct.
fn parse<T: DeserializeOwned>(parameters: Map<String, Value>) -> Result<T, Error> {
    serde_json::from_value(Value::Object(parameters)).map_err(|e| Error::InvalidParams(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ApiCredentials;
    use crate::store::RecordStore;
    use crate::testutil::{FakeConnector, ScriptedPrompt};

    fn dispatcher_with(connector: Arc<FakeConnector>, dir: &std::path::Path) -> CommandDispatcher {
        let manager = SessionManager::new(
            Arc::new(RecordStore::new(dir)),
            connector,
            Arc::new(ScriptedPrompt::new(&[])),
            Some(ApiCredentials {
                api_id: 12345,
                api_hash: "hash".into(),
            }),
        );
        CommandDispatcher::new(Arc::new(manager))
    }

    fn request(name: &str, parameters: Value) -> CommandRequest {
        CommandRequest {
            name: name.to_string(),
            parameters: parameters.as_object().cloned().unwrap_or_default(),
        }
    }

    async fn seeded(dir: &std::path::Path) -> (Arc<FakeConnector>, CommandDispatcher) {
        let connector = Arc::new(FakeConnector::new().with_accepted_token("T1"));
        let dispatcher = dispatcher_with(connector.clone(), dir);
        dispatcher.sessions.store().save("+1000", "T1").await.unwrap();
        (connector, dispatcher)
    }

    #[tokio::test]
    async fn unknown_command_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, dispatcher) = seeded(dir.path()).await;

        let result = dispatcher
            .dispatch(request("bogus", serde_json::json!({})))
            .await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::NotFound));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn missing_required_parameter_is_rejected_before_the_backend() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, dispatcher) = seeded(dir.path()).await;

        // getMessages without chatId: schema validation must fail without
        // contacting the remote backend.
        let result = dispatcher
            .dispatch(request("getMessages", serde_json::json!({"session": "+1000"})))
            .await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::InvalidParameters));
        assert_eq!(connector.connect_count(), 0);
    }

    #[tokio::test]
    async fn get_dialogs_applies_the_default_limit() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, dispatcher) = seeded(dir.path()).await;

        let result = dispatcher
            .dispatch(request("getDialogs", serde_json::json!({"session": "+1000"})))
            .await;
        assert!(result.is_success(), "got {result:?}");
        assert_eq!(connector.last_dialog_limit(), 100);
    }

    #[tokio::test]
    async fn get_messages_round_trips_payload() {
        let dir = tempfile::tempdir().unwrap();
        let (connector, dispatcher) = seeded(dir.path()).await;

        let result = dispatcher
            .dispatch(request(
                "getMessages",
                serde_json::json!({"session": "+1000", "chatId": 42, "limit": 5}),
            ))
            .await;
        let CommandResult::Success(payload) = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(payload["chatId"], 42);
        assert_eq!(payload["messages"][0]["text"], "hello");
        assert_eq!(connector.last_message_limit(), 5);
    }

    #[tokio::test]
    async fn send_message_returns_the_sent_message() {
        let dir = tempfile::tempdir().unwrap();
        let (_connector, dispatcher) = seeded(dir.path()).await;

        let result = dispatcher
            .dispatch(request(
                "sendMessage",
                serde_json::json!({"session": "+1000", "chatId": 42, "message": "ping"}),
            ))
            .await;
        let CommandResult::Success(payload) = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(payload["sent"]["text"], "ping");
        assert_eq!(payload["sent"]["chat_id"], 42);
    }

    #[tokio::test]
    async fn execute_method_defaults_params_to_empty_object() {
        let dir = tempfile::tempdir().unwrap();
        let (_connector, dispatcher) = seeded(dir.path()).await;

        let result = dispatcher
            .dispatch(request(
                "executeMethod",
                serde_json::json!({"session": "+1000", "method": "help.getConfig"}),
            ))
            .await;
        let CommandResult::Success(payload) = result else {
            panic!("expected success, got {result:?}");
        };
        assert_eq!(payload["result"]["method"], "help.getConfig");
        assert_eq!(payload["result"]["params"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn unauthenticatable_session_is_session_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        // No saved record, no credentials: acquire fails with
        // MissingCredentials, surfaced at the dispatch boundary as
        // SessionUnavailable.
        let manager = SessionManager::new(
            Arc::new(RecordStore::new(dir.path())),
            Arc::new(FakeConnector::new()),
            Arc::new(ScriptedPrompt::new(&[])),
            None,
        );
        let dispatcher = CommandDispatcher::new(Arc::new(manager));

        let result = dispatcher
            .dispatch(request("getDialogs", serde_json::json!({"session": "+1000"})))
            .await;
        assert_eq!(result.failure_kind(), Some(ErrorKind::SessionUnavailable));
        let CommandResult::Failure(f) = result else {
            unreachable!()
        };
        assert!(f.message.contains("no API credentials"), "got {}", f.message);
    }

    #[test]
    fn every_registered_command_declares_a_schema() {
        for info in COMMAND_REGISTRY {
            let schema = command_schema(info.name).expect(info.name);
            assert!(schema.contains_key("properties"), "{}", info.name);
        }
        assert!(command_schema("bogus").is_none());
        assert!(get_command("getDialogs").is_some());
        assert!(get_command("bogus").is_none());
    }
}
