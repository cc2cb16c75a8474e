//! Key-value store abstraction and the concurrency-control layer above it.
//!
//! The relay treats its store the way a serverless function treats a blob
//! service: opaque byte values, addressed by string key, reached through
//! short-lived async calls, with no transactions, no compare-and-swap, and no
//! atomic list mutation. Everything richer than a single-key write is built
//! in this module:
//!
//! - [`Store`] adds JSON (de)serialization over the raw [`Kv`] trait, and
//! - [`KeyLocks`] serializes read-modify-write sequences per key, so two
//!   request handlers mutating the same index or queue can never silently
//!   discard each other's write.
//!
//! The lock table is the load-bearing piece: index and queue updates are
//! read-entire-value, mutate, write-entire-value, and without serialization
//! the second writer wins and the first writer's entry is lost.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::OwnedMutexGuard;

/// Errors surfaced by the store layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("corrupt value at key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode value: {0}")]
    Encode(#[source] serde_json::Error),
}

/// Raw key-value backend: opaque bytes by string key.
///
/// Methods return boxed futures so backends stay object-safe behind
/// `Arc<dyn Kv>` while still modeling the store as awaitable request/response
/// calls.
pub trait Kv: Send + Sync + 'static {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<Vec<u8>>, StoreError>>;
    fn set<'a>(&'a self, key: &'a str, value: Vec<u8>) -> BoxFuture<'a, Result<(), StoreError>>;
    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<(), StoreError>>;
}

/// Per-key async lock table.
///
/// Entries are created on first use and kept for the life of the process; the
/// key population is bounded by the target fleet, so no reaping is done.
#[derive(Clone, Default)]
pub struct KeyLocks {
    inner: Arc<parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if another task holds it.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut map = self.inner.lock();
            map.entry(key.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

/// JSON-typed view over a [`Kv`] backend plus the per-key lock table.
///
/// Cheap to clone; all clones share the backend and the lock table.
#[derive(Clone)]
pub struct Store {
    kv: Arc<dyn Kv>,
    locks: KeyLocks,
}

impl Store {
    pub fn new(kv: Arc<dyn Kv>) -> Self {
        Self {
            kv,
            locks: KeyLocks::new(),
        }
    }

    /// In-memory store, for tests and `--memory` mode.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// Read and decode the value at `key`. `None` if the key is absent.
    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.kv.get(key).await? {
            None => Ok(None),
            Some(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|source| StoreError::Decode {
                    key: key.to_string(),
                    source,
                }),
        }
    }

    /// Encode and write `value` at `key`, overwriting any prior value.
    pub async fn put_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(StoreError::Encode)?;
        self.kv.set(key, bytes).await
    }

    /// Delete the value at `key`. Deleting an absent key succeeds.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.kv.delete(key).await
    }

    /// Take the per-key lock guarding read-modify-write sequences on `key`.
    ///
    /// Callers hold the returned guard across the whole read-mutate-write
    /// sequence. Locks are only ever taken one at a time, so lock ordering
    /// cannot deadlock.
    pub async fn lock(&self, key: &str) -> OwnedMutexGuard<()> {
        self.locks.acquire(key).await
    }
}
