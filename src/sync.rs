//! Background-sync handling: one flush cycle per recognized trigger.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::clients::ClientRegistry;
use crate::error::{Error, Result};
use crate::lookup::Resolver;
use crate::queue::QueueStore;

/// Tag of the replay trigger that drives a flush.
pub const SYNC_TAG: &str = "sync-movie-queue";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
  /// Queue items resolved and broadcast
  pub items: usize,
  /// Successful client deliveries across all items
  pub deliveries: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
  /// Tag not handled here
  Ignored,
  Flushed(FlushReport),
}

pub struct SyncHandler<Q: QueueStore, R: Resolver> {
  queue: Arc<Q>,
  resolver: Arc<R>,
  clients: Arc<ClientRegistry>,
}

impl<Q: QueueStore, R: Resolver> SyncHandler<Q, R> {
  pub fn new(queue: Arc<Q>, resolver: Arc<R>, clients: Arc<ClientRegistry>) -> Self {
    Self {
      queue,
      resolver,
      clients,
    }
  }

  /// Handle a replay trigger. Only [`SYNC_TAG`] flushes; any other tag is
  /// ignored.
  pub async fn handle(&self, tag: &str) -> Result<SyncOutcome> {
    if tag != SYNC_TAG {
      debug!(tag, "ignoring sync trigger");
      return Ok(SyncOutcome::Ignored);
    }
    self
      .flush()
      .await
      .map(SyncOutcome::Flushed)
      .inspect_err(|e| warn!(error = %e, "flush aborted, queue left for the next trigger"))
  }

  /// Drain the queue, resolve and broadcast each item in order, then clear.
  ///
  /// The first failing item aborts the cycle and the queue is left as it
  /// was, so the next trigger replays the whole batch again, including
  /// items that were already broadcast.
  pub async fn flush(&self) -> Result<FlushReport> {
    let items = self.queue.drain_all()?;
    info!(items = items.len(), "flushing movie queue");

    let mut report = FlushReport::default();
    for item in &items {
      let failed = |e: Error| Error::ResolutionOrDeliveryFailure {
        item_id: item.id,
        reason: e.to_string(),
      };

      let record = self.resolver.resolve(&item.subject).await.map_err(failed)?;
      report.deliveries += self.clients.broadcast(&record).map_err(failed)?;
      report.items += 1;
    }

    self.queue.clear()?;
    info!(items = report.items, deliveries = report.deliveries, "flush complete");
    Ok(report)
  }
}
