//! Forward document store contract and the in-memory backend.
//!
//! The reverse index only holds business IDs and feature bitmaps; full
//! documents live in a key-value forward store behind the [`ForwardStore`]
//! trait. Durable backends plug in through the same trait.

use crate::error::{Result, StorageError};
use bytes::Bytes;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

/// Key-value contract the per-node indexer consumes.
pub trait ForwardStore: Send + Sync {
    /// Read the value stored under `key`, `None` when absent.
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>>;

    /// Write `value` under `key`, overwriting any previous value.
    fn set(&self, key: &[u8], value: Bytes) -> Result<()>;

    /// Read many keys at once. Order is not guaranteed and missing
    /// entries come back empty.
    fn batch_get(&self, keys: &[&[u8]]) -> Result<Vec<Bytes>>;

    /// Remove `key`. No-op when absent.
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// True when `key` is present.
    fn has(&self, key: &[u8]) -> bool;

    /// Visit every record, returning the number visited.
    fn for_each(&self, visit: &mut dyn FnMut(&[u8], &[u8])) -> u64;

    /// Number of records in the store.
    fn len(&self) -> u64;

    /// True when the store holds no records.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flush and release the store.
    fn close(&self) -> Result<()>;
}

/// Backend selector for [`open_store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StoreBackend {
    /// Process-local in-memory store.
    Memory,
}

impl Default for StoreBackend {
    fn default() -> Self {
        StoreBackend::Memory
    }
}

/// Open a forward store for the configured backend.
pub fn open_store(backend: StoreBackend) -> Result<std::sync::Arc<dyn ForwardStore>> {
    match backend {
        StoreBackend::Memory => Ok(std::sync::Arc::new(MemoryStore::new())),
    }
}

/// In-memory forward store backed by a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<Vec<u8>, Bytes>,
    closed: AtomicBool,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StorageError::Closed.into());
        }
        Ok(())
    }
}

impl ForwardStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        self.check_open()?;
        Ok(self.records.get(key).map(|v| v.clone()))
    }

    fn set(&self, key: &[u8], value: Bytes) -> Result<()> {
        self.check_open()?;
        self.records.insert(key.to_vec(), value);
        Ok(())
    }

    fn batch_get(&self, keys: &[&[u8]]) -> Result<Vec<Bytes>> {
        self.check_open()?;
        Ok(keys
            .iter()
            .map(|key| {
                self.records
                    .get(*key)
                    .map(|v| v.clone())
                    .unwrap_or_else(Bytes::new)
            })
            .collect())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.check_open()?;
        self.records.remove(key);
        Ok(())
    }

    fn has(&self, key: &[u8]) -> bool {
        self.records.contains_key(key)
    }

    fn for_each(&self, visit: &mut dyn FnMut(&[u8], &[u8])) -> u64 {
        let mut count = 0;
        for entry in self.records.iter() {
            visit(entry.key(), entry.value());
            count += 1;
        }
        count
    }

    fn len(&self) -> u64 {
        self.records.len() as u64
    }

    fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
