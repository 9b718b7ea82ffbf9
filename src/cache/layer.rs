//! Expiring key-value cache on top of a persistent store.

use chrono::{DateTime, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use super::traits::{CacheEntry, EntryMeta, PersistentStore};
use crate::clock::Clock;

/// TTL applied by [`CacheStore::set`].
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Metadata about one stored entry, for status listings.
#[derive(Debug, Clone)]
pub struct EntryInfo {
  pub key: String,
  pub written_at: Option<DateTime<Utc>>,
  pub expires_at: Option<DateTime<Utc>>,
}

/// Cache store that wraps every value in a [`CacheEntry`] envelope.
///
/// Reads never fail: a missing, expired or undecodable entry is a miss, and
/// the latter two are deleted on the way out.
#[derive(Clone)]
pub struct CacheStore {
  store: Arc<dyn PersistentStore>,
  clock: Arc<dyn Clock>,
  default_ttl: Duration,
}

impl CacheStore {
  pub fn new(store: Arc<dyn PersistentStore>, clock: Arc<dyn Clock>) -> Self {
    Self {
      store,
      clock,
      default_ttl: DEFAULT_TTL,
    }
  }

  /// Set the TTL used by [`CacheStore::set`].
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl = ttl;
    self
  }

  pub fn now(&self) -> DateTime<Utc> {
    self.clock.now()
  }

  /// Get a value if present and unexpired.
  pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
    let raw = match self.store.get(key) {
      Ok(Some(raw)) => raw,
      Ok(None) => return None,
      Err(e) => {
        warn!(key, error = %e, "cache read failed");
        return None;
      }
    };

    match serde_json::from_str::<CacheEntry<T>>(&raw) {
      Ok(entry) if entry.is_valid_at(self.now()) => Some(entry.value),
      Ok(_) => {
        debug!(key, "cache entry expired");
        self.remove(key);
        None
      }
      Err(e) => {
        warn!(key, error = %e, "discarding malformed cache entry");
        self.remove(key);
        None
      }
    }
  }

  /// Store a value with the default TTL.
  pub fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
    self.set_with_ttl(key, value, self.default_ttl)
  }

  /// Store a value that expires `ttl` from now.
  pub fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<()> {
    let now = self.now().timestamp_millis();
    let ttl_millis = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
    let entry = CacheEntry {
      value,
      expires_at: now.saturating_add(ttl_millis),
      written_at: now,
    };

    let data =
      serde_json::to_string(&entry).map_err(|e| eyre!("Failed to serialize {}: {}", key, e))?;
    self.store.set(key, &data)
  }

  /// Delete an entry. Missing keys and store errors are ignored.
  pub fn remove(&self, key: &str) {
    if let Err(e) = self.store.delete(key) {
      warn!(key, error = %e, "cache delete failed");
    }
  }

  /// Delete every entry whose key starts with `prefix`.
  pub fn remove_prefix(&self, prefix: &str) -> Result<usize> {
    let keys: Vec<String> = self
      .store
      .keys()?
      .into_iter()
      .filter(|k| k.starts_with(prefix))
      .collect();

    for key in &keys {
      self.store.delete(key)?;
    }

    debug!(prefix, removed = keys.len(), "invalidated cache entries");
    Ok(keys.len())
  }

  /// When `key` was last written, whether or not it has expired since.
  pub fn last_written(&self, key: &str) -> Option<DateTime<Utc>> {
    let raw = self.store.get(key).ok()??;
    let meta: EntryMeta = serde_json::from_str(&raw).ok()?;
    Utc.timestamp_millis_opt(meta.written_at).single()
  }

  /// Metadata for every stored entry.
  pub fn entries(&self) -> Result<Vec<EntryInfo>> {
    let mut entries = Vec::new();
    for key in self.store.keys()? {
      let meta = self
        .store
        .get(&key)?
        .and_then(|raw| serde_json::from_str::<EntryMeta>(&raw).ok());
      entries.push(EntryInfo {
        written_at: meta
          .as_ref()
          .and_then(|m| Utc.timestamp_millis_opt(m.written_at).single()),
        expires_at: meta.and_then(|m| Utc.timestamp_millis_opt(m.expires_at).single()),
        key,
      });
    }
    Ok(entries)
  }

  /// Wipe the whole store.
  pub fn clear_all(&self) -> Result<()> {
    self.store.clear()
  }

  /// The raw store underneath, for values that are not cache entries.
  pub(crate) fn store(&self) -> &dyn PersistentStore {
    self.store.as_ref()
  }
}
