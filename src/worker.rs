//! Event dispatch: routes lifecycle, fetch and sync events to their handlers.

use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::cache::{CacheResult, CacheStore, FetchInterceptor};
use crate::clients::ClientRegistry;
use crate::error::Result;
use crate::lifecycle::{ActivateReport, InstallReport, Lifecycle, LifecycleState};
use crate::lookup::Resolver;
use crate::network::{Network, Request, Response};
use crate::queue::QueueStore;
use crate::sync::{SyncHandler, SyncOutcome};

/// Settings for one service version.
#[derive(Debug, Clone)]
pub struct WorkerOptions {
  /// Cache namespace, doubles as the version identifier
  pub namespace: String,
  /// Assets fetched at install, relative to `origin` or absolute
  pub manifest: Vec<String>,
  pub origin: Url,
}

impl Default for WorkerOptions {
  fn default() -> Self {
    Self {
      namespace: "movie-pwa-v1".to_string(),
      manifest: vec![
        "/".to_string(),
        "/index.html".to_string(),
        "https://cdn.jsdelivr.net/npm/tailwindcss@2.2.19/dist/tailwind.min.css".to_string(),
      ],
      origin: Url::parse("http://localhost:8080").expect("static origin is valid"),
    }
  }
}

/// Events delivered by the host environment.
#[derive(Debug, Clone)]
pub enum WorkerEvent {
  Install,
  Activate,
  Fetch(Request),
  Sync { tag: String },
}

impl WorkerEvent {
  pub fn name(&self) -> &'static str {
    match self {
      WorkerEvent::Install => "install",
      WorkerEvent::Activate => "activate",
      WorkerEvent::Fetch(_) => "fetch",
      WorkerEvent::Sync { .. } => "sync",
    }
  }
}

/// What a handler produced. The host awaits this before moving on.
#[derive(Debug, Clone)]
pub enum EventOutcome {
  Installed(InstallReport),
  Activated(ActivateReport),
  Responded(CacheResult<Response>),
  Synced(SyncOutcome),
}

/// One service version with its injected capabilities.
pub struct ServiceWorker<C, N, Q, R>
where
  C: CacheStore,
  N: Network,
  Q: QueueStore,
  R: Resolver,
{
  lifecycle: Lifecycle<C, N>,
  interceptor: FetchInterceptor<C, N>,
  sync: SyncHandler<Q, R>,
  clients: Arc<ClientRegistry>,
}

impl<C, N, Q, R> ServiceWorker<C, N, Q, R>
where
  C: CacheStore,
  N: Network,
  Q: QueueStore,
  R: Resolver,
{
  pub fn new(
    options: WorkerOptions,
    cache: Arc<C>,
    network: Arc<N>,
    queue: Arc<Q>,
    resolver: Arc<R>,
    clients: Arc<ClientRegistry>,
  ) -> Self {
    let lifecycle = Lifecycle::new(
      Arc::clone(&cache),
      Arc::clone(&network),
      Arc::clone(&clients),
      options.namespace,
      options.manifest,
      options.origin.clone(),
    );
    // The interceptor reads exactly the namespace the lifecycle populates.
    let interceptor = FetchInterceptor::new(cache, network, lifecycle.namespace(), options.origin);
    let sync = SyncHandler::new(queue, resolver, Arc::clone(&clients));

    Self {
      lifecycle,
      interceptor,
      sync,
      clients,
    }
  }

  pub fn state(&self) -> LifecycleState {
    self.lifecycle.state()
  }

  pub fn namespace(&self) -> &str {
    self.lifecycle.namespace()
  }

  pub fn clients(&self) -> &Arc<ClientRegistry> {
    &self.clients
  }

  pub fn skip_waiting_requested(&self) -> bool {
    self.lifecycle.skip_waiting_requested()
  }

  pub async fn dispatch(&self, event: WorkerEvent) -> Result<EventOutcome> {
    debug!(event = event.name(), "dispatching");
    match event {
      WorkerEvent::Install => self.lifecycle.install().await.map(EventOutcome::Installed),
      WorkerEvent::Activate => self.lifecycle.activate().await.map(EventOutcome::Activated),
      WorkerEvent::Fetch(request) => self
        .interceptor
        .handle(&request)
        .await
        .map(EventOutcome::Responded),
      WorkerEvent::Sync { tag } => self.sync.handle(&tag).await.map(EventOutcome::Synced),
    }
  }

  /// Install, then activate straight away when install asked to skip waiting.
  pub async fn install_and_activate(&self) -> Result<(InstallReport, Option<ActivateReport>)> {
    let installed = self.lifecycle.install().await?;
    if !self.lifecycle.skip_waiting_requested() {
      return Ok((installed, None));
    }
    let activated = self.lifecycle.activate().await?;
    Ok((installed, Some(activated)))
  }
}
