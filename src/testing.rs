//! Test doubles for the injected capabilities.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::cache::{CacheEntry, CacheStore, RequestKey};
use crate::clients::{Client, ClientMessage};
use crate::error::{Error, Result};
use crate::lookup::{MovieCatalog, ResultRecord, Resolver};
use crate::network::{Network, Request, Response};

/// Network that answers from a fixed table. Unknown URLs fail.
#[derive(Default)]
pub struct FakeNetwork {
  responses: HashMap<String, Response>,
  calls: AtomicUsize,
  offline: AtomicBool,
}

impl FakeNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_response(mut self, url: &str, response: Response) -> Self {
    self.responses.insert(url.to_string(), response);
    self
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }

  /// Fail every fetch from now on, whatever the table says.
  pub fn go_offline(&self) {
    self.offline.store(true, Ordering::SeqCst);
  }
}

#[async_trait]
impl Network for FakeNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self
      .responses
      .get(&request.url)
      .filter(|_| !self.offline.load(Ordering::SeqCst))
      .cloned()
      .ok_or_else(|| Error::NetworkFailure {
        url: request.url.clone(),
        reason: "offline".into(),
      })
  }
}

/// Resolver that delegates to the catalog but fails for one subject.
pub struct FailingResolver {
  pub fail_on: String,
}

#[async_trait]
impl Resolver for FailingResolver {
  async fn resolve(&self, subject: &str) -> Result<ResultRecord> {
    if subject == self.fail_on {
      return Err(Error::NetworkFailure {
        url: "lookup".into(),
        reason: format!("lookup for {} failed", subject),
      });
    }
    Ok(MovieCatalog::lookup(subject))
  }
}

/// Client whose every delivery fails.
pub struct BrokenClient {
  pub id: String,
}

impl Client for BrokenClient {
  fn id(&self) -> &str {
    &self.id
  }

  fn post_message(&self, _message: &ClientMessage) -> Result<()> {
    Err(Error::ClientDisconnected(self.id.clone()))
  }
}

/// Cache storage whose disk has gone away.
pub struct BrokenCache;

impl BrokenCache {
  fn unavailable() -> Error {
    Error::StorageUnavailable("disk gone".into())
  }
}

impl CacheStore for BrokenCache {
  fn put_all(&self, _namespace: &str, _entries: &[(RequestKey, Response)]) -> Result<()> {
    Err(Self::unavailable())
  }

  fn get(&self, _namespace: &str, _key: &RequestKey) -> Result<Option<CacheEntry>> {
    Err(Self::unavailable())
  }

  fn keys(&self, _namespace: &str) -> Result<Vec<RequestKey>> {
    Err(Self::unavailable())
  }

  fn namespaces(&self) -> Result<Vec<String>> {
    Err(Self::unavailable())
  }

  fn delete_namespace(&self, _namespace: &str) -> Result<bool> {
    Err(Self::unavailable())
  }
}
