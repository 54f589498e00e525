#![allow(dead_code)]

use async_trait::async_trait;
use burrow_core::store::Result;
use burrow_core::{Committed, KvStore, Mapping, Metadata, ReadStore, ShortCode, StorageError};
use burrow_storage::InMemoryStore;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the next `put_if_absent` call does.
#[derive(Debug, Clone)]
pub enum PutFault {
    /// Reports the error without writing anything.
    Fail(StorageError),
    /// Writes the mapping, then reports the error as if the reply was lost.
    CommitThenFail(StorageError),
}

/// An in-memory store that injects scripted failures.
///
/// Once the fault script is empty every call passes through to the inner
/// store.
#[derive(Debug, Default)]
pub struct FaultyStore {
    inner: InMemoryStore,
    put_faults: Mutex<VecDeque<PutFault>>,
    exists_error: Option<StorageError>,
    get_error: Option<StorageError>,
    put_calls: AtomicUsize,
    exists_calls: AtomicUsize,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_put_faults(faults: impl IntoIterator<Item = PutFault>) -> Self {
        Self {
            put_faults: Mutex::new(faults.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn failing_exists(mut self, err: StorageError) -> Self {
        self.exists_error = Some(err);
        self
    }

    pub fn failing_get(mut self, err: StorageError) -> Self {
        self.get_error = Some(err);
        self
    }

    pub fn put_calls(&self) -> usize {
        self.put_calls.load(Ordering::SeqCst)
    }

    pub fn exists_calls(&self) -> usize {
        self.exists_calls.load(Ordering::SeqCst)
    }

    pub fn inner(&self) -> &InMemoryStore {
        &self.inner
    }
}

#[async_trait]
impl ReadStore for FaultyStore {
    async fn get(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        match &self.get_error {
            Some(err) => Err(err.clone()),
            None => self.inner.get(code).await,
        }
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        self.exists_calls.fetch_add(1, Ordering::SeqCst);
        match &self.exists_error {
            Some(err) => Err(err.clone()),
            None => self.inner.exists(code).await,
        }
    }
}

#[async_trait]
impl KvStore for FaultyStore {
    async fn put_if_absent(&self, code: &ShortCode, mapping: &Mapping) -> Result<Committed> {
        self.put_calls.fetch_add(1, Ordering::SeqCst);
        let fault = self.put_faults.lock().unwrap().pop_front();

        match fault {
            None => self.inner.put_if_absent(code, mapping).await,
            Some(PutFault::Fail(err)) => Err(err),
            Some(PutFault::CommitThenFail(err)) => {
                self.inner.put_if_absent(code, mapping).await?;
                Err(err)
            }
        }
    }
}

pub fn code(s: &str) -> ShortCode {
    ShortCode::new_unchecked(s)
}

/// Claims `codes` directly in `store` so later candidates collide with them.
pub async fn occupy<S: KvStore>(store: &S, codes: &[&str]) {
    for c in codes {
        store
            .put_if_absent(
                &code(c),
                &Mapping::new(format!("https://occupied.example/{c}"), Metadata::new()),
            )
            .await
            .unwrap();
    }
}
