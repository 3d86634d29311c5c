//! MCP server surface for the Telegram session manager.

use crate::dispatch::{command_schema, CommandDispatcher, CommandRequest, COMMAND_REGISTRY};
use rmcp::model::{
    CallToolRequestParams, CallToolResult, Content, ListToolsResult, PaginatedRequestParams,
    ServerCapabilities, ServerInfo, Tool,
};
use rmcp::service::{RequestContext, RoleServer};
use rmcp::{ErrorData as McpError, ServerHandler};
use serde_json::Map;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::debug;

/// MCP server exposing the command surface over stdio.
#[derive(Clone)]
pub struct TgMcpServer {
    dispatcher: Arc<CommandDispatcher>,
}

impl TgMcpServer {
    pub fn new(dispatcher: Arc<CommandDispatcher>) -> Self {
        Self { dispatcher }
    }

    fn instructions(&self) -> String {
        "Telegram multi-account session manager.\n\n\
         Sessions are keyed by identifier (international phone number). Every tool \
         takes a `session` argument; the connection for that identifier is resumed \
         from its saved token, or logged in interactively on the server console on \
         first use (login code, and second-factor password where enabled).\n\n\
         Tools:\n\
         - getDialogs: list recent chats for a session\n\
         - getMessages: fetch recent messages from one chat (chatId from getDialogs)\n\
         - sendMessage: send a text message to one chat\n\
         - executeMethod: invoke a raw protocol method by name\n\n\
         First use of a new identifier requires an operator at the server console."
            .to_string()
    }

    fn make_tool(name: &'static str, description: &'static str) -> Tool {
        let schema = command_schema(name).unwrap_or_else(Map::new);
        Tool {
            name: Cow::Borrowed(name),
            description: Some(Cow::Borrowed(description)),
            input_schema: Arc::new(schema),
            annotations: None,
            execution: None,
            icons: None,
            meta: None,
            output_schema: None,
            title: None,
        }
    }

    fn command_tools() -> Vec<Tool> {
        COMMAND_REGISTRY
            .iter()
            .map(|info| Self::make_tool(info.name, info.description))
            .collect()
    }
}

impl ServerHandler for TgMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            instructions: Some(self.instructions()),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self,
        _params: Option<PaginatedRequestParams>,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, McpError> {
        Ok(ListToolsResult {
            tools: Self::command_tools(),
            next_cursor: None,
            meta: None,
        })
    }

    async fn call_tool(
        &self,
        params: CallToolRequestParams,
        _ctx: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, McpError> {
        debug!(tool = %params.name, "tool call received");
        let request = CommandRequest {
            name: params.name.to_string(),
            parameters: params.arguments.unwrap_or_default(),
        };
        match self.dispatcher.dispatch(request).await {
            crate::dispatch::CommandResult::Success(payload) => {
                let text = serde_json::to_string_pretty(&payload)
                    .unwrap_or_else(|_| payload.to_string());
                Ok(CallToolResult::success(vec![Content::text(text)]))
            }
            crate::dispatch::CommandResult::Failure(failure) => {
                let text = serde_json::to_string(&failure)
                    .unwrap_or_else(|_| failure.message.clone());
                Ok(CallToolResult::error(vec![Content::text(text)]))
            }
        }
    }
}
