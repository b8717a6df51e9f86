//! Offline request cache.
//!
//! This module provides:
//! - Versioned cache namespaces of request/response pairs (`CacheStore`)
//! - A SQLite-backed store that survives restarts
//! - The cache-first fetch interceptor (serve from cache, fall through to network)

mod layer;
mod storage;
mod traits;

pub use layer::FetchInterceptor;
pub use storage::SqliteCacheStore;
pub use traits::{CacheEntry, CacheResult, CacheSource, CacheStore, RequestKey};
