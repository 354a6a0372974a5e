//! ConsoleBind library.
//!
//! This library provides the core functionality for the ConsoleBind Discord
//! bot: parsing game-server console output into events and turning chat
//! triggers into rule-driven console commands, respawn teleports and Gun Game
//! progression.

pub mod error;
pub mod config;
pub mod console;
pub mod events;
pub mod names;
pub mod storage;
pub mod rules;
pub mod cooldowns;
pub mod links;
pub mod queue;
pub mod position;
pub mod rolegate;
pub mod autotp;
pub mod gungame;
pub mod store;
pub mod engine;
pub mod types;
pub mod commands;
pub mod bot;

pub use error::{ConsoleBindError, Result};
pub use config::Config;
