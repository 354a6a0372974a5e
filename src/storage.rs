//! JSON snapshot persistence.
//!
//! All persisted state lives in small JSON documents written as full snapshots
//! after every mutation. Mutation frequency is low (admin-driven) and the data
//! is small, so snapshot writes are simpler and safer than incremental updates.
//! File I/O runs on the blocking pool to keep it off the async runtime.

use crate::error::{ConsoleBindError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;

/// Serialize `value` and write it to `path`, creating parent directories as
/// needed.
pub async fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let data = serde_json::to_string_pretty(value)?;
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data.as_bytes())?;
        Ok(())
    })
    .await??;
    Ok(())
}

/// Read and deserialize `path`. A missing file is `Ok(None)`, not an error;
/// first boot starts from empty state.
pub async fn load_json<T: DeserializeOwned + Send + 'static>(path: &Path) -> Result<Option<T>> {
    let path = path.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<Option<T>> {
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        let value = serde_json::from_str(&data).map_err(|e| {
            ConsoleBindError::Persistence(format!(
                "failed to parse {}: {}",
                path.display(),
                e
            ))
        })?;
        Ok(Some(value))
    })
    .await?
}
