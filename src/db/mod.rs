//! SQLite connection helpers shared by the cache and queue stores.

use rusqlite::Connection;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Open or create a database file, creating its parent directory first.
pub fn open_file(path: &Path) -> Result<Connection> {
  if let Some(parent) = path.parent() {
    std::fs::create_dir_all(parent).map_err(|e| {
      Error::StorageUnavailable(format!(
        "failed to create directory {}: {}",
        parent.display(),
        e
      ))
    })?;
  }

  Connection::open(path).map_err(|e| {
    Error::StorageUnavailable(format!(
      "failed to open database at {}: {}",
      path.display(),
      e
    ))
  })
}

/// Open a private in-memory database.
pub fn open_in_memory() -> Result<Connection> {
  Ok(Connection::open_in_memory()?)
}

/// Get the default data directory.
pub fn default_data_dir() -> Result<PathBuf> {
  let data_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| Error::StorageUnavailable("could not determine data directory".into()))?;

  Ok(data_dir.join("movie-offline"))
}
