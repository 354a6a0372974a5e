//! Type definitions and aliases for the bot.
//!
//! This module contains shared types used throughout the application.

use crate::engine::BindEngine;
use std::sync::Arc;

/// Bot application data shared across all commands.
///
/// This data is accessible in all command handlers through the context.
pub struct Data {
    /// The bind engine owning all rule, cooldown and guild state
    pub engine: Arc<BindEngine>,
}

/// Error type for bot commands (maintains compatibility with poise).
pub type Error = Box<dyn std::error::Error + Send + Sync>;

/// Command context type alias for easier usage.
pub type Context<'a> = poise::Context<'a, Data, Error>;
