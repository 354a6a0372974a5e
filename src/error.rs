//! Custom error types for consolebind.
//!
//! This module provides a centralized error handling system with specific error types
//! for different parts of the application.

use std::fmt;

/// Main error type for consolebind operations.
#[derive(Debug)]
pub enum ConsoleBindError {
    /// Configuration errors (missing env vars, invalid values)
    Config(String),
    /// Validation errors (bad indices, missing servers, malformed input)
    Validation(String),
    /// Console command execution errors
    Console(String),
    /// Discord API errors (role lookups, member fetches)
    Discord(String),
    /// Position request timed out waiting for a console response
    Timeout(String),
    /// State file read/write errors
    Persistence(String),
    /// Generic I/O errors
    Io(std::io::Error),
}

impl fmt::Display for ConsoleBindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "Configuration error: {}", msg),
            Self::Validation(msg) => write!(f, "Validation error: {}", msg),
            Self::Console(msg) => write!(f, "Console error: {}", msg),
            Self::Discord(msg) => write!(f, "Discord error: {}", msg),
            Self::Timeout(msg) => write!(f, "Timed out: {}", msg),
            Self::Persistence(msg) => write!(f, "Persistence error: {}", msg),
            Self::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for ConsoleBindError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConsoleBindError::Io(err) => Some(err),
            _ => None,
        }
    }
}

// Implement From traits for automatic error conversion
impl From<std::io::Error> for ConsoleBindError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<serde_json::Error> for ConsoleBindError {
    fn from(err: serde_json::Error) -> Self {
        Self::Persistence(format!("JSON error: {}", err))
    }
}

impl From<std::env::VarError> for ConsoleBindError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for ConsoleBindError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Persistence(format!("Task join error: {}", err))
    }
}

impl From<poise::serenity_prelude::Error> for ConsoleBindError {
    fn from(err: poise::serenity_prelude::Error) -> Self {
        Self::Discord(err.to_string())
    }
}

/// Result type alias for consolebind operations.
pub type Result<T> = std::result::Result<T, ConsoleBindError>;
