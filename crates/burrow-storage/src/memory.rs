use async_trait::async_trait;
use burrow_core::store::{Committed, KvStore, ReadStore, Result};
use burrow_core::{Mapping, ShortCode, StorageError};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::trace;

/// In-memory implementation of [`KvStore`] using DashMap.
///
/// The claim runs under the shard's write lock through the entry API, so the
/// existence check and the insert are one step. Keys are the namespaced
/// store keys (`u/<code>`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    storage: DashMap<String, Mapping>,
}

impl InMemoryStore {
    /// Creates a new in-memory store.
    pub fn new() -> Self {
        Self {
            storage: DashMap::new(),
        }
    }

    /// Creates a new in-memory store with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            storage: DashMap::with_capacity(capacity),
        }
    }

    /// Number of committed mappings.
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

#[async_trait]
impl ReadStore for InMemoryStore {
    async fn get(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        Ok(self
            .storage
            .get(&code.store_key())
            .map(|entry| entry.value().clone()))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        Ok(self.storage.contains_key(&code.store_key()))
    }
}

#[async_trait]
impl KvStore for InMemoryStore {
    async fn put_if_absent(&self, code: &ShortCode, mapping: &Mapping) -> Result<Committed> {
        let key = code.store_key();

        match self.storage.entry(key) {
            Entry::Occupied(entry) => Err(StorageError::AlreadyExists(entry.key().clone())),
            Entry::Vacant(entry) => {
                trace!(key = %entry.key(), "claimed key in memory");
                entry.insert(mapping.clone());
                Ok(Committed)
            }
        }
    }
}
