//! Durable queue of pending movie lookups.
//!
//! Items are write-once: they are appended by `enqueue`, read in insertion
//! order by `drain_all` and removed all at once by `clear`. The store makes
//! no promise spanning a `drain_all` and the following `clear`; an item
//! enqueued between the two is removed without having been drained.

use rusqlite::{params, Connection, Transaction};
use std::path::Path;
use std::sync::Mutex;

use crate::db;
use crate::error::{Error, Result};

/// Name of the queue database.
pub const QUEUE_DB_NAME: &str = "movie-queue";
/// Schema version of the queue database.
pub const QUEUE_SCHEMA_VERSION: i64 = 1;

/// A pending lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueItem {
  /// Store-assigned, strictly increasing, never reused
  pub id: i64,
  pub subject: String,
}

/// Queue capability.
pub trait QueueStore: Send + Sync {
  /// Append a subject and return the stored item.
  fn enqueue(&self, subject: &str) -> Result<QueueItem>;

  /// Snapshot of every item in insertion order. Does not remove anything.
  fn drain_all(&self) -> Result<Vec<QueueItem>>;

  /// Remove every item atomically.
  fn clear(&self) -> Result<()>;

  fn len(&self) -> Result<usize>;

  fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }
}

/// SQLite-based queue store.
pub struct SqliteQueueStore {
  conn: Mutex<Connection>,
}

/// `AUTOINCREMENT` keeps ids monotonic across `clear`.
const QUEUE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    subject TEXT NOT NULL
);
"#;

impl SqliteQueueStore {
  /// Open or create the queue database at `path`. Safe to call repeatedly.
  pub fn open(path: &Path) -> Result<Self> {
    Self::from_connection(db::open_file(path)?)
  }

  /// Open a private in-memory queue.
  pub fn open_in_memory() -> Result<Self> {
    Self::from_connection(db::open_in_memory()?)
  }

  fn from_connection(mut conn: Connection) -> Result<Self> {
    run_migrations(&mut conn)?;
    Ok(Self {
      conn: Mutex::new(conn),
    })
  }

  /// Run `f` inside a transaction that commits on success and rolls back
  /// on every other exit path.
  fn with_transaction<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
    let mut conn = self.conn.lock()?;
    let tx = conn.transaction()?;
    let value = f(&tx)?;
    tx.commit()?;
    Ok(value)
  }
}

fn run_migrations(conn: &mut Connection) -> Result<()> {
  let tx = conn.transaction()?;
  let version: i64 = tx.query_row("PRAGMA user_version", [], |row| row.get(0))?;

  if version > QUEUE_SCHEMA_VERSION {
    return Err(Error::StorageUnavailable(format!(
      "{} schema version {} is newer than supported version {}",
      QUEUE_DB_NAME, version, QUEUE_SCHEMA_VERSION
    )));
  }

  tx.execute_batch(QUEUE_SCHEMA)?;
  if version < QUEUE_SCHEMA_VERSION {
    tx.pragma_update(None, "user_version", QUEUE_SCHEMA_VERSION)?;
  }

  tx.commit()?;
  Ok(())
}

impl QueueStore for SqliteQueueStore {
  fn enqueue(&self, subject: &str) -> Result<QueueItem> {
    self.with_transaction(|tx| {
      tx.execute("INSERT INTO queue (subject) VALUES (?)", params![subject])?;
      Ok(QueueItem {
        id: tx.last_insert_rowid(),
        subject: subject.to_string(),
      })
    })
  }

  fn drain_all(&self) -> Result<Vec<QueueItem>> {
    self.with_transaction(|tx| {
      let mut stmt = tx.prepare("SELECT id, subject FROM queue ORDER BY id")?;
      let items = stmt
        .query_map([], |row| {
          Ok(QueueItem {
            id: row.get(0)?,
            subject: row.get(1)?,
          })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(items)
    })
  }

  fn clear(&self) -> Result<()> {
    self.with_transaction(|tx| {
      tx.execute("DELETE FROM queue", [])?;
      Ok(())
    })
  }

  fn len(&self) -> Result<usize> {
    self.with_transaction(|tx| {
      let count: i64 = tx.query_row("SELECT COUNT(*) FROM queue", [], |row| row.get(0))?;
      Ok(count as usize)
    })
  }
}
