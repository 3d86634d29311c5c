//! Telegram MCP Server
//!
//! This library provides an MCP (Model Context Protocol) server that manages
//! multiple authenticated Telegram sessions and exposes messaging commands to
//! LLM agents over stdio.
//!
//! # Architecture
//!
//! - **SessionManager**: The single choke point for connectivity. Holds the
//!   connection pool and drives the authentication state machine; every
//!   command obtains its connection through `acquire`.
//!
//! - **RecordStore**: Persistent per-identifier session records (exported
//!   session tokens), one JSON file per identifier.
//!
//! - **CommandDispatcher**: Schema-validates untrusted command parameters and
//!   routes them to session-scoped operations. All failures come back as
//!   structured results, never as protocol faults.
//!
//! - **TgMcpServer**: The MCP server surface, using the `rmcp` crate for
//!   protocol handling over stdio.
//!
//! - **BackendClient / BackendConnector**: Object-safe boundary to the remote
//!   MTProto backend. The production connector (grammers) is behind the
//!   `grammers` feature; tests inject scripted doubles.
//!
//! # Tools
//!
//! - `getDialogs`: List recent dialogs (chats) for one session
//! - `getMessages`: Fetch recent messages from one chat
//! - `sendMessage`: Send a text message to one chat
//! - `executeMethod`: Invoke a raw protocol method by name
//!
//! First use of a new identifier drives an interactive login dialog (code,
//! and second-factor password where enabled) on the server console; stdout
//! stays reserved for the MCP protocol.

pub mod backend;
pub mod dispatch;
pub mod error;
pub mod prompt;
pub mod server;
pub mod session;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use backend::{ApiCredentials, BackendClient, BackendConnector, ConnectMode};
pub use dispatch::{CommandDispatcher, CommandRequest, CommandResult, COMMAND_REGISTRY};
pub use error::{Error, ErrorKind};
pub use server::TgMcpServer;
pub use session::{reconcile, ReconcileOptions, SessionManager};
pub use store::RecordStore;
