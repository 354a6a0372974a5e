//! Configuration management for consolebind.
//!
//! This module handles loading and validating environment variables and application settings.

use crate::error::{ConsoleBindError, Result};
use std::env;
use std::path::PathBuf;

/// Default interval between periodic command-queue pump passes.
pub const DEFAULT_QUEUE_INTERVAL_MS: u64 = 500;

/// Configuration for the application, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Discord bot token
    pub discord_token: String,
    /// Directory holding the persisted JSON documents (binds, cooldowns, servers)
    pub data_dir: PathBuf,
    /// Interval in milliseconds between periodic queue pump passes
    pub queue_interval_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// This will attempt to load a .env file if present using dotenv,
    /// then read required environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if any required environment variable is missing or invalid.
    pub fn from_env() -> Result<Self> {
        // Load .env file if present (ignore errors - it's optional)
        dotenv::dotenv().ok();

        let discord_token = env::var("DISCORD_TOKEN").map_err(|_| {
            ConsoleBindError::Config(
                "Missing DISCORD_TOKEN environment variable. Set it in your environment or create a .env file (never commit this file).".to_string(),
            )
        })?;

        let data_dir = Self::resolve_data_dir(env::var("DATA_DIR").ok())?;
        let queue_interval_ms =
            Self::parse_queue_interval(env::var("QUEUE_INTERVAL_MS").ok().as_deref())?;

        Ok(Self {
            discord_token,
            data_dir,
            queue_interval_ms,
        })
    }

    /// Resolve the data directory from the environment or use `./data`,
    /// creating it if it does not exist yet.
    fn resolve_data_dir(var: Option<String>) -> Result<PathBuf> {
        let dir = match var {
            Some(path) => PathBuf::from(path),
            None => {
                let mut path = env::current_dir().map_err(|e| {
                    ConsoleBindError::Config(format!(
                        "Failed to determine current directory: {}",
                        e
                    ))
                })?;
                path.push("data");
                path
            }
        };

        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                ConsoleBindError::Config(format!(
                    "Failed to create data directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        if !dir.is_dir() {
            return Err(ConsoleBindError::Config(format!(
                "DATA_DIR is not a directory: '{}'",
                dir.display()
            )));
        }

        Ok(dir)
    }

    /// Parse the queue pump interval, defaulting to 500ms.
    fn parse_queue_interval(var: Option<&str>) -> Result<u64> {
        match var {
            None => Ok(DEFAULT_QUEUE_INTERVAL_MS),
            Some(raw) => {
                let value = raw.parse::<u64>().map_err(|_| {
                    ConsoleBindError::Config(format!(
                        "Invalid QUEUE_INTERVAL_MS value: '{}'",
                        raw
                    ))
                })?;
                if value == 0 {
                    return Err(ConsoleBindError::Config(
                        "QUEUE_INTERVAL_MS must be greater than zero".to_string(),
                    ));
                }
                Ok(value)
            }
        }
    }
}
