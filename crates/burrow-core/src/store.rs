use crate::error::StorageError;
use crate::mapping::Mapping;
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Proof that a conditional write claimed its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Committed;

/// A read-only view of a key-value store.
///
/// The redirector only needs this half of the contract.
#[async_trait]
pub trait ReadStore: Send + Sync + 'static {
    /// Retrieves the mapping for a given short code.
    /// Returns `None` if the code has never been claimed.
    async fn get(&self, code: &ShortCode) -> Result<Option<Mapping>>;

    /// Checks whether a short code is currently claimed.
    ///
    /// The answer may be stale by the time the caller acts on it, so it must
    /// only ever feed logging or metrics, never a uniqueness decision.
    async fn exists(&self, code: &ShortCode) -> Result<bool>;
}

/// A durable store that can atomically claim a key.
#[async_trait]
pub trait KvStore: ReadStore {
    /// Writes `mapping` under `code` if and only if the key has no value yet.
    ///
    /// Among concurrent callers racing on the same key exactly one observes
    /// `Ok(Committed)`; every other caller gets
    /// `Err(StorageError::AlreadyExists)` and the stored value is left
    /// untouched. A reader never observes a partially written mapping.
    async fn put_if_absent(&self, code: &ShortCode, mapping: &Mapping) -> Result<Committed>;
}

#[async_trait]
impl<T: ReadStore + ?Sized> ReadStore for std::sync::Arc<T> {
    async fn get(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        (**self).get(code).await
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        (**self).exists(code).await
    }
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for std::sync::Arc<T> {
    async fn put_if_absent(&self, code: &ShortCode, mapping: &Mapping) -> Result<Committed> {
        (**self).put_if_absent(code, mapping).await
    }
}
