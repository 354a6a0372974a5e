//! Console session abstraction.
//!
//! The browser-automation layer that owns the actual web-console session lives
//! outside this crate; the core only needs a way to send one line of input to a
//! given server and receive textual feedback. That seam is the
//! [`ConsoleExecutor`] trait.

use crate::error::{ConsoleBindError, Result};
use async_trait::async_trait;
use std::fmt;

/// Identifies one game-console session: a server within a Discord guild.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServerKey {
    pub guild_id: String,
    pub server_id: String,
}

impl ServerKey {
    pub fn new(guild_id: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            guild_id: guild_id.into(),
            server_id: server_id.into(),
        }
    }
}

impl fmt::Display for ServerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.guild_id, self.server_id)
    }
}

/// Sends one line of console input to a server and returns its textual feedback.
///
/// Implementations are provided by the session layer (browser automation in
/// production, mocks in tests). Failures surface as [`ConsoleBindError::Console`]
/// and are logged by callers, never retried by the core.
#[async_trait]
pub trait ConsoleExecutor: Send + Sync {
    async fn execute(&self, server: &ServerKey, command: &str) -> Result<String>;
}

/// Placeholder executor used until a real console session bridge is attached.
///
/// Every command fails with a "not connected" error, mirroring how commands
/// against an unconnected server are rejected.
#[derive(Debug, Default)]
pub struct DisconnectedConsole;

impl DisconnectedConsole {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ConsoleExecutor for DisconnectedConsole {
    async fn execute(&self, server: &ServerKey, _command: &str) -> Result<String> {
        Err(ConsoleBindError::Console(format!(
            "server {} is not connected",
            server
        )))
    }
}
