//! Error taxonomy shared by the cache, queue, lifecycle and sync components.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Persistence medium could not be opened, read or written.
  #[error("storage unavailable: {0}")]
  StorageUnavailable(String),

  /// A manifest asset could not be retrieved during install.
  #[error("failed to fetch asset {url}: {reason}")]
  AssetFetchFailed { url: String, reason: String },

  /// Network fallback on a cache miss failed.
  #[error("network request to {url} failed: {reason}")]
  NetworkFailure { url: String, reason: String },

  /// Resolve or broadcast failed while flushing the queue.
  #[error("flush aborted at queue item {item_id}: {reason}")]
  ResolutionOrDeliveryFailure { item_id: i64, reason: String },

  /// A single client could not receive a message. Never escapes a broadcast.
  #[error("client {0} is no longer reachable")]
  ClientDisconnected(String),

  /// Lifecycle step requested from the wrong state.
  #[error("invalid lifecycle transition: {0}")]
  InvalidState(String),
}

impl From<rusqlite::Error> for Error {
  fn from(err: rusqlite::Error) -> Self {
    Error::StorageUnavailable(err.to_string())
  }
}

impl From<serde_json::Error> for Error {
  fn from(err: serde_json::Error) -> Self {
    Error::StorageUnavailable(format!("corrupt stored record: {}", err))
  }
}

impl<T> From<std::sync::PoisonError<T>> for Error {
  fn from(err: std::sync::PoisonError<T>) -> Self {
    Error::StorageUnavailable(format!("lock poisoned: {}", err))
  }
}

pub type Result<T> = std::result::Result<T, Error>;
