//! Command parameter types.
//!
//! These structs declare the schema for each supported command: field types,
//! required fields, and defaults for optional fields. Validation happens by
//! deserializing the untrusted parameter object into the typed struct before
//! any session is acquired.

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

pub(crate) fn default_limit() -> usize {
    100
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetDialogsRequest {
    #[schemars(description = "Session identifier (international phone number)")]
    pub session: String,
    #[schemars(description = "Maximum dialogs to return (default: 100)")]
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetMessagesRequest {
    #[schemars(description = "Session identifier (international phone number)")]
    pub session: String,
    #[schemars(description = "Numeric chat identifier, as returned by getDialogs")]
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    #[schemars(description = "Maximum messages to return (default: 100)")]
    #[serde(default = "default_limit")]
    pub limit: usize,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct SendMessageRequest {
    #[schemars(description = "Session identifier (international phone number)")]
    pub session: String,
    #[schemars(description = "Numeric chat identifier, as returned by getDialogs")]
    #[serde(rename = "chatId")]
    pub chat_id: i64,
    #[schemars(description = "Message text to send")]
    pub message: String,
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ExecuteMethodRequest {
    #[schemars(description = "Session identifier (international phone number)")]
    pub session: String,
    #[schemars(description = "Raw protocol method name, e.g. messages.getHistory")]
    pub method: String,
    #[schemars(description = "Method parameters as a JSON object (default: {})")]
    #[serde(default)]
    pub params: Map<String, Value>,
}
