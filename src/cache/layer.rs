//! Cache-first fetch interceptor.

use std::sync::Arc;
use tracing::debug;
use url::Url;

use super::traits::{CacheResult, CacheStore};
use crate::error::{Error, Result};
use crate::network::{Network, Request, Response};

/// Interceptor that answers every request from the offline cache when it
/// can and falls through to the network otherwise.
///
/// It only ever reads the namespace it was built with and never writes to
/// the cache: population belongs to the lifecycle manager.
pub struct FetchInterceptor<C: CacheStore, N: Network> {
  cache: Arc<C>,
  network: Arc<N>,
  namespace: String,
  origin: Url,
}

impl<C: CacheStore, N: Network> FetchInterceptor<C, N> {
  pub fn new(cache: Arc<C>, network: Arc<N>, namespace: impl Into<String>, origin: Url) -> Self {
    Self {
      cache,
      network,
      namespace: namespace.into(),
      origin,
    }
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  /// Answer a request with a cache-first strategy.
  ///
  /// 1. Look the request up in the namespace - on a hit, return it as stored
  /// 2. On a miss, issue exactly one network fetch and return its response
  /// 3. A network failure is returned to the caller unchanged
  ///
  /// A cache read error is returned as is; the network is not consulted.
  pub async fn handle(&self, request: &Request) -> Result<CacheResult<Response>> {
    let request = request.resolve(&self.origin).map_err(|e| Error::NetworkFailure {
      url: request.url.clone(),
      reason: e.to_string(),
    })?;
    let key = request.key();

    if let Some(entry) = self.cache.get(&self.namespace, &key)? {
      debug!(url = %key.url, method = %key.method, "cache hit");
      return Ok(CacheResult::from_cache(entry.response, entry.cached_at));
    }
    debug!(url = %key.url, method = %key.method, "cache miss");

    let response = self.network.fetch(&request).await?;
    Ok(CacheResult::from_network(response))
  }
}

impl<C: CacheStore, N: Network> Clone for FetchInterceptor<C, N> {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
      network: Arc::clone(&self.network),
      namespace: self.namespace.clone(),
      origin: self.origin.clone(),
    }
  }
}
