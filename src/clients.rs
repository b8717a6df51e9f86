//! Connected application instances and best-effort broadcast to them.

use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::lookup::ResultRecord;

/// Message posted to clients.
///
/// Serializes as `{ "type": "movie-result", "details": { ... } }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "details")]
pub enum ClientMessage {
  #[serde(rename = "movie-result")]
  MovieResult(ResultRecord),
}

/// An open application instance that can receive messages.
pub trait Client: Send + Sync {
  fn id(&self) -> &str;

  fn post_message(&self, message: &ClientMessage) -> Result<()>;
}

struct ClientSlot {
  client: Arc<dyn Client>,
  /// Cache namespace of the service version controlling this client
  controller: Option<String>,
}

/// Registry of currently connected clients.
#[derive(Default)]
pub struct ClientRegistry {
  slots: RwLock<Vec<ClientSlot>>,
}

impl ClientRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a client. Reconnecting with a known id replaces the old entry.
  pub fn connect(&self, client: Arc<dyn Client>) -> Result<()> {
    let mut slots = self.slots.write()?;
    slots.retain(|slot| slot.client.id() != client.id());
    debug!(client = client.id(), "client connected");
    slots.push(ClientSlot {
      client,
      controller: None,
    });
    Ok(())
  }

  /// Remove a client. Returns whether it was connected.
  pub fn disconnect(&self, id: &str) -> Result<bool> {
    let mut slots = self.slots.write()?;
    let before = slots.len();
    slots.retain(|slot| slot.client.id() != id);
    Ok(slots.len() != before)
  }

  pub fn ids(&self) -> Result<Vec<String>> {
    let slots = self.slots.read()?;
    Ok(slots.iter().map(|slot| slot.client.id().to_string()).collect())
  }

  /// Namespace of the service version controlling a client, if any.
  pub fn controller(&self, id: &str) -> Result<Option<String>> {
    let slots = self.slots.read()?;
    Ok(
      slots
        .iter()
        .find(|slot| slot.client.id() == id)
        .and_then(|slot| slot.controller.clone()),
    )
  }

  /// Take control of every connected client. Returns how many were claimed.
  pub fn claim(&self, namespace: &str) -> Result<usize> {
    let mut slots = self.slots.write()?;
    for slot in slots.iter_mut() {
      slot.controller = Some(namespace.to_string());
    }
    Ok(slots.len())
  }

  /// Deliver a record to every client connected right now.
  ///
  /// Delivery is best-effort: a failing client is logged and skipped.
  /// Returns the number of successful deliveries.
  pub fn broadcast(&self, record: &ResultRecord) -> Result<usize> {
    let clients: Vec<Arc<dyn Client>> = {
      let slots = self.slots.read()?;
      slots.iter().map(|slot| Arc::clone(&slot.client)).collect()
    };

    let message = ClientMessage::MovieResult(record.clone());
    let mut delivered = 0;
    for client in clients {
      match client.post_message(&message) {
        Ok(()) => delivered += 1,
        Err(e) => warn!(client = client.id(), error = %e, "failed to deliver result"),
      }
    }

    Ok(delivered)
  }
}

/// Client backed by an unbounded channel, for in-process hosts.
pub struct ChannelClient {
  id: String,
  tx: mpsc::UnboundedSender<ClientMessage>,
}

impl ChannelClient {
  pub fn new(id: impl Into<String>) -> (Self, mpsc::UnboundedReceiver<ClientMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { id: id.into(), tx }, rx)
  }
}

impl Client for ChannelClient {
  fn id(&self) -> &str {
    &self.id
  }

  fn post_message(&self, message: &ClientMessage) -> Result<()> {
    self
      .tx
      .send(message.clone())
      .map_err(|_| Error::ClientDisconnected(self.id.clone()))
  }
}

/// Client that prints each message as one JSON line on stdout.
pub struct StdoutClient {
  id: String,
}

impl StdoutClient {
  pub fn new(id: impl Into<String>) -> Self {
    Self { id: id.into() }
  }
}

impl Client for StdoutClient {
  fn id(&self) -> &str {
    &self.id
  }

  fn post_message(&self, message: &ClientMessage) -> Result<()> {
    let line =
      serde_json::to_string(message).map_err(|_| Error::ClientDisconnected(self.id.clone()))?;
    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{}", line).map_err(|_| Error::ClientDisconnected(self.id.clone()))
  }
}
