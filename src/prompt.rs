//! Interactive prompt boundary.
//!
//! The login dialog needs operator input (identifier confirmation, one-time
//! code, second-factor password). The medium is injected as a capability so
//! the authentication state machine can be exercised with scripted answers.

use crate::error::Error;
use async_trait::async_trait;
use std::io::{BufRead, Write};

/// Source of operator-typed text.
#[async_trait]
pub trait PromptMedium: Send + Sync {
    /// Display `label` and return one line of operator input.
    async fn request_text(&self, label: &str) -> Result<String, Error>;
}

/// Prompt on the operator terminal.
///
/// The label goes to stderr because stdout carries the MCP protocol; the
/// answer is read from stdin on a blocking task.
#[derive(Default)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl PromptMedium for ConsolePrompt {
    async fn request_text(&self, label: &str) -> Result<String, Error> {
        let label = label.to_string();
        tokio::task::spawn_blocking(move || {
            let mut stderr = std::io::stderr();
            write!(stderr, "{label}: ").map_err(|e| Error::Prompt(e.to_string()))?;
            stderr.flush().map_err(|e| Error::Prompt(e.to_string()))?;

            let mut line = String::new();
            let read = std::io::stdin()
                .lock()
                .read_line(&mut line)
                .map_err(|e| Error::Prompt(e.to_string()))?;
            if read == 0 {
                return Err(Error::Prompt("stdin closed".into()));
            }
            Ok(line.trim_end_matches(['\r', '\n']).to_string())
        })
        .await
        .map_err(|e| Error::Prompt(e.to_string()))?
    }
}
