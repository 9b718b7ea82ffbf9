//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};

/// Flat string-keyed storage backing the cache.
///
/// Implementations only need single-key atomicity; the cache layer never
/// relies on multi-key transactions.
pub trait PersistentStore: Send + Sync {
  /// Raw value stored at `key`.
  fn get(&self, key: &str) -> Result<Option<String>>;

  /// Store `value` at `key`, replacing any previous value.
  fn set(&self, key: &str, value: &str) -> Result<()>;

  /// Delete `key`. Deleting a missing key is not an error.
  fn delete(&self, key: &str) -> Result<()>;

  /// Every key currently stored.
  fn keys(&self) -> Result<Vec<String>>;

  /// Delete everything.
  fn clear(&self) -> Result<()>;
}

/// Envelope persisted around every cached value.
///
/// Timestamps are milliseconds since the Unix epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub value: T,
  pub expires_at: i64,
  pub written_at: i64,
}

impl<T> CacheEntry<T> {
  pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
    now.timestamp_millis() < self.expires_at
  }
}

/// Envelope with the value left undecoded, for metadata-only reads.
#[derive(Debug, Deserialize)]
pub(crate) struct EntryMeta {
  pub expires_at: i64,
  pub written_at: i64,
}
