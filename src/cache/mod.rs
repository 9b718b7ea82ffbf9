//! Generic expiring cache for data persistence between runs.
//!
//! This module knows nothing about Jira:
//! - `PersistentStore` abstracts the flat key-value medium (SQLite or memory)
//! - `CacheStore` wraps values in an envelope carrying expiry and write time
//! - Expired or undecodable entries are dropped on read

mod layer;
mod storage;
mod traits;

pub use layer::CacheStore;
pub use storage::{MemoryStore, SqliteStore};
pub use traits::PersistentStore;
