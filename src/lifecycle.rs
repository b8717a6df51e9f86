//! Install/activate lifecycle of one service version.
//!
//! A version is identified by its cache namespace. Installing fetches the
//! whole manifest before writing anything, so a failed install leaves the
//! cache exactly as it was and any previous version keeps serving.

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};
use url::Url;

use crate::cache::{CacheStore, RequestKey};
use crate::clients::ClientRegistry;
use crate::error::{Error, Result};
use crate::network::{Network, Request, Response};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  /// Created, nothing done yet
  Parsed,
  Installing,
  Installed,
  Activating,
  Active,
  /// First install failed; this version will never activate
  Redundant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallReport {
  pub namespace: String,
  pub assets: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivateReport {
  pub namespace: String,
  /// Older namespaces removed during activation
  pub removed_namespaces: Vec<String>,
  pub claimed_clients: usize,
}

pub struct Lifecycle<C: CacheStore, N: Network> {
  cache: Arc<C>,
  network: Arc<N>,
  clients: Arc<ClientRegistry>,
  namespace: String,
  manifest: Vec<String>,
  origin: Url,
  state: Mutex<LifecycleState>,
  skip_waiting: AtomicBool,
}

impl<C: CacheStore, N: Network> Lifecycle<C, N> {
  pub fn new(
    cache: Arc<C>,
    network: Arc<N>,
    clients: Arc<ClientRegistry>,
    namespace: impl Into<String>,
    manifest: Vec<String>,
    origin: Url,
  ) -> Self {
    Self {
      cache,
      network,
      clients,
      namespace: namespace.into(),
      manifest,
      origin,
      state: Mutex::new(LifecycleState::Parsed),
      skip_waiting: AtomicBool::new(false),
    }
  }

  pub fn namespace(&self) -> &str {
    &self.namespace
  }

  pub fn state(&self) -> LifecycleState {
    match self.state.lock() {
      Ok(state) => *state,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }

  /// Whether install asked to replace the running version without waiting
  /// for its clients to close.
  pub fn skip_waiting_requested(&self) -> bool {
    self.skip_waiting.load(Ordering::SeqCst)
  }

  /// Move to `next` if the current state is one of `allowed`, returning the
  /// state moved from.
  fn transition(&self, allowed: &[LifecycleState], next: LifecycleState) -> Result<LifecycleState> {
    let mut state = self.state.lock()?;
    let previous = *state;
    if !allowed.contains(&previous) {
      return Err(Error::InvalidState(format!(
        "cannot move from {:?} to {:?}",
        previous, next
      )));
    }
    debug!(from = ?previous, to = ?next, namespace = %self.namespace, "lifecycle transition");
    *state = next;
    Ok(previous)
  }

  fn set_state(&self, next: LifecycleState) {
    match self.state.lock() {
      Ok(mut state) => *state = next,
      Err(poisoned) => *poisoned.into_inner() = next,
    }
  }

  /// Populate the namespace with every manifest asset.
  ///
  /// Running install again over the same manifest rewrites the same entries,
  /// so the cache ends up identical to a single run. A failed re-install
  /// leaves an already installed version `Installed`; a failed first
  /// install makes it `Redundant`.
  pub async fn install(&self) -> Result<InstallReport> {
    let previous = self.transition(
      &[LifecycleState::Parsed, LifecycleState::Installed],
      LifecycleState::Installing,
    )?;
    let on_failure = match previous {
      LifecycleState::Installed => LifecycleState::Installed,
      _ => LifecycleState::Redundant,
    };
    info!(namespace = %self.namespace, assets = self.manifest.len(), "installing");

    let fetched = join_all(self.manifest.iter().map(|url| self.fetch_asset(url))).await;
    let entries = match fetched.into_iter().collect::<Result<Vec<_>>>() {
      Ok(entries) => entries,
      Err(e) => {
        warn!(namespace = %self.namespace, error = %e, "install failed");
        self.set_state(on_failure);
        return Err(e);
      }
    };

    if let Err(e) = self.cache.put_all(&self.namespace, &entries) {
      warn!(namespace = %self.namespace, error = %e, "install failed to write cache");
      self.set_state(on_failure);
      return Err(e);
    }

    self.skip_waiting.store(true, Ordering::SeqCst);
    self.set_state(LifecycleState::Installed);
    info!(namespace = %self.namespace, "installed");

    Ok(InstallReport {
      namespace: self.namespace.clone(),
      assets: entries.len(),
    })
  }

  async fn fetch_asset(&self, url: &str) -> Result<(RequestKey, Response)> {
    let failed = |reason: String| Error::AssetFetchFailed {
      url: url.to_string(),
      reason,
    };

    let request = Request::get(url)
      .resolve(&self.origin)
      .map_err(|e| failed(e.to_string()))?;
    let response = self
      .network
      .fetch(&request)
      .await
      .map_err(|e| failed(e.to_string()))?;

    if !response.is_success() {
      return Err(failed(format!("HTTP status {}", response.status)));
    }

    Ok((request.key(), response))
  }

  /// Supersede older versions and take control of every open client.
  pub async fn activate(&self) -> Result<ActivateReport> {
    self.transition(&[LifecycleState::Installed], LifecycleState::Activating)?;

    let report = match self.take_over() {
      Ok(report) => report,
      Err(e) => {
        warn!(namespace = %self.namespace, error = %e, "activation failed");
        self.set_state(LifecycleState::Installed);
        return Err(e);
      }
    };

    self.set_state(LifecycleState::Active);
    info!(
      namespace = %self.namespace,
      claimed = report.claimed_clients,
      removed = ?report.removed_namespaces,
      "active"
    );
    Ok(report)
  }

  fn take_over(&self) -> Result<ActivateReport> {
    let mut removed_namespaces = Vec::new();
    for namespace in self.cache.namespaces()? {
      if namespace != self.namespace && self.cache.delete_namespace(&namespace)? {
        removed_namespaces.push(namespace);
      }
    }

    let claimed_clients = self.clients.claim(&self.namespace)?;

    Ok(ActivateReport {
      namespace: self.namespace.clone(),
      removed_namespaces,
      claimed_clients,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteCacheStore;
  use crate::clients::ChannelClient;
  use crate::testing::FakeNetwork;

  const CDN: &str = "https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css";

  fn manifest() -> Vec<String> {
    vec!["/".into(), "/index.html".into(), CDN.into()]
  }

  fn full_network() -> FakeNetwork {
    FakeNetwork::new()
      .with_response("http://localhost:8080/", Response::new(200, "root"))
      .with_response("http://localhost:8080/index.html", Response::new(200, "index"))
      .with_response(CDN, Response::new(200, "css"))
  }

  fn lifecycle(
    cache: Arc<SqliteCacheStore>,
    network: FakeNetwork,
    namespace: &str,
  ) -> Lifecycle<SqliteCacheStore, FakeNetwork> {
    Lifecycle::new(
      cache,
      Arc::new(network),
      Arc::new(ClientRegistry::new()),
      namespace,
      manifest(),
      Url::parse("http://localhost:8080").unwrap(),
    )
  }

  fn expected_keys() -> Vec<RequestKey> {
    let mut keys = vec![
      RequestKey::new("GET", "http://localhost:8080/"),
      RequestKey::new("GET", "http://localhost:8080/index.html"),
      RequestKey::new("GET", CDN),
    ];
    keys.sort_by(|a, b| a.url.cmp(&b.url));
    keys
  }

  fn stored_responses(cache: &SqliteCacheStore, namespace: &str) -> Vec<(RequestKey, Response)> {
    cache
      .keys(namespace)
      .unwrap()
      .into_iter()
      .map(|key| {
        let entry = cache.get(namespace, &key).unwrap().unwrap();
        (key, entry.response)
      })
      .collect()
  }

  #[tokio::test]
  async fn test_install_populates_every_manifest_asset() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let lifecycle = lifecycle(cache.clone(), full_network(), "movie-pwa-v1");

    let report = lifecycle.install().await.unwrap();

    assert_eq!(report.assets, 3);
    assert_eq!(lifecycle.state(), LifecycleState::Installed);
    assert!(lifecycle.skip_waiting_requested());
    assert_eq!(cache.keys("movie-pwa-v1").unwrap(), expected_keys());
  }

  #[tokio::test]
  async fn test_install_twice_equals_install_once() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let lifecycle = lifecycle(cache.clone(), full_network(), "movie-pwa-v1");

    lifecycle.install().await.unwrap();
    let once = stored_responses(&cache, "movie-pwa-v1");
    lifecycle.install().await.unwrap();

    assert_eq!(stored_responses(&cache, "movie-pwa-v1"), once);
    assert_eq!(
      once.iter().map(|(key, _)| key.clone()).collect::<Vec<_>>(),
      expected_keys()
    );
  }

  #[tokio::test]
  async fn test_failed_reinstall_keeps_version_installed() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let network = Arc::new(full_network());
    let lifecycle = Lifecycle::new(
      cache.clone(),
      network.clone(),
      Arc::new(ClientRegistry::new()),
      "movie-pwa-v1",
      manifest(),
      Url::parse("http://localhost:8080").unwrap(),
    );
    lifecycle.install().await.unwrap();
    let installed = stored_responses(&cache, "movie-pwa-v1");

    network.go_offline();
    let err = lifecycle.install().await.unwrap_err();

    assert!(matches!(err, Error::AssetFetchFailed { .. }));
    assert_eq!(lifecycle.state(), LifecycleState::Installed);
    assert_eq!(stored_responses(&cache, "movie-pwa-v1"), installed);
    lifecycle.activate().await.unwrap();
    assert_eq!(lifecycle.state(), LifecycleState::Active);
  }

  #[tokio::test]
  async fn test_failed_asset_aborts_install_without_writing() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let network = FakeNetwork::new()
      .with_response("http://localhost:8080/", Response::new(200, "root"))
      .with_response("http://localhost:8080/index.html", Response::new(200, "index"));
    let lifecycle = lifecycle(cache.clone(), network, "movie-pwa-v1");

    let err = lifecycle.install().await.unwrap_err();

    assert!(matches!(err, Error::AssetFetchFailed { ref url, .. } if url == CDN));
    assert_eq!(lifecycle.state(), LifecycleState::Redundant);
    assert!(!lifecycle.skip_waiting_requested());
    assert!(cache.namespaces().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_error_status_fails_install() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let network = full_network().with_response("http://localhost:8080/index.html", Response::new(500, ""));
    let lifecycle = lifecycle(cache, network, "movie-pwa-v1");

    let err = lifecycle.install().await.unwrap_err();
    assert!(matches!(err, Error::AssetFetchFailed { ref url, .. } if url == "/index.html"));
  }

  #[tokio::test]
  async fn test_failed_upgrade_keeps_previous_version() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let v1 = lifecycle(cache.clone(), full_network(), "movie-pwa-v1");
    v1.install().await.unwrap();
    v1.activate().await.unwrap();

    let v2 = lifecycle(cache.clone(), FakeNetwork::new(), "movie-pwa-v2");
    assert!(v2.install().await.is_err());
    assert!(v2.activate().await.is_err());

    assert_eq!(cache.namespaces().unwrap(), vec!["movie-pwa-v1".to_string()]);
    assert_eq!(cache.keys("movie-pwa-v1").unwrap(), expected_keys());
  }

  #[tokio::test]
  async fn test_activate_supersedes_old_namespaces_and_claims_clients() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let old = lifecycle(cache.clone(), full_network(), "movie-pwa-v1");
    old.install().await.unwrap();

    let clients = Arc::new(ClientRegistry::new());
    let (tab, _rx) = ChannelClient::new("tab-1");
    clients.connect(Arc::new(tab)).unwrap();

    let new = Lifecycle::new(
      cache.clone(),
      Arc::new(full_network()),
      clients.clone(),
      "movie-pwa-v2",
      manifest(),
      Url::parse("http://localhost:8080").unwrap(),
    );
    new.install().await.unwrap();
    let report = new.activate().await.unwrap();

    assert_eq!(new.state(), LifecycleState::Active);
    assert_eq!(report.removed_namespaces, vec!["movie-pwa-v1".to_string()]);
    assert_eq!(report.claimed_clients, 1);
    assert_eq!(cache.namespaces().unwrap(), vec!["movie-pwa-v2".to_string()]);
    assert_eq!(clients.controller("tab-1").unwrap().as_deref(), Some("movie-pwa-v2"));
  }

  #[tokio::test]
  async fn test_activate_requires_install() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let lifecycle = lifecycle(cache, full_network(), "movie-pwa-v1");

    let err = lifecycle.activate().await.unwrap_err();

    assert!(matches!(err, Error::InvalidState(_)));
    assert_eq!(lifecycle.state(), LifecycleState::Parsed);
  }

  #[tokio::test]
  async fn test_active_version_cannot_reinstall() {
    let cache = Arc::new(SqliteCacheStore::open_in_memory().unwrap());
    let lifecycle = lifecycle(cache, full_network(), "movie-pwa-v1");
    lifecycle.install().await.unwrap();
    lifecycle.activate().await.unwrap();

    assert!(matches!(
      lifecycle.install().await.unwrap_err(),
      Error::InvalidState(_)
    ));
    assert_eq!(lifecycle.state(), LifecycleState::Active);
  }
}
