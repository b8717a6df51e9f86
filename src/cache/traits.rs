//! Core traits and types for the offline cache.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::network::Response;

/// Identity of a cached request: method plus URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
  pub method: String,
  pub url: String,
}

impl RequestKey {
  pub fn new(method: &str, url: &str) -> Self {
    Self {
      method: method.to_ascii_uppercase(),
      url: url.to_string(),
    }
  }

  /// Stable, fixed-length storage key.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b" ");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A stored request/response pair.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub key: RequestKey,
  pub response: Response,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Cache capability: versioned namespaces of request/response pairs.
pub trait CacheStore: Send + Sync {
  /// Write all entries into a namespace in one transaction, creating the
  /// namespace if needed. Existing entries with the same key are replaced.
  fn put_all(&self, namespace: &str, entries: &[(RequestKey, Response)]) -> Result<()>;

  /// Look up a request in a namespace.
  fn get(&self, namespace: &str, key: &RequestKey) -> Result<Option<CacheEntry>>;

  /// All keys stored in a namespace, sorted.
  fn keys(&self, namespace: &str) -> Result<Vec<RequestKey>>;

  /// Names of all existing namespaces.
  fn namespaces(&self) -> Result<Vec<String>>;

  /// Drop a namespace and all of its entries. Returns whether it existed.
  fn delete_namespace(&self, namespace: &str) -> Result<bool>;
}

/// Result from an intercepted fetch, including where the data came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from network data.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Served from the offline cache
  Cache,
  /// Cache miss, fetched from the network
  Network,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_hash_distinguishes_method() {
    let get = RequestKey::new("GET", "http://localhost/");
    let head = RequestKey::new("HEAD", "http://localhost/");
    assert_ne!(get.cache_hash(), head.cache_hash());
  }

  #[test]
  fn test_cache_hash_ignores_method_case() {
    let a = RequestKey::new("get", "http://localhost/");
    let b = RequestKey::new("GET", "http://localhost/");
    assert_eq!(a, b);
    assert_eq!(a.cache_hash(), b.cache_hash());
    assert_eq!(a.cache_hash().len(), 64);
  }
}
