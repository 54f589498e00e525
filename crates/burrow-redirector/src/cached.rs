use async_trait::async_trait;
use burrow_core::store::{Committed, KvStore, ReadStore, Result};
use burrow_core::{Mapping, ShortCode, StorageError};
use moka::future::Cache;
use std::time::Duration;
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

/// Sizing and expiry for [`CachedStore`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct CacheConfig {
    /// Maximum number of mappings held in memory.
    #[builder(default = 10_000)]
    pub max_capacity: u64,
    /// Time-to-live for cached mappings.
    #[builder(default, setter(strip_option))]
    pub ttl: Option<Duration>,
    /// Time-to-idle for cached mappings.
    #[builder(default, setter(strip_option))]
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Why a single-flight fetch produced nothing to cache.
#[derive(Debug)]
enum Miss {
    Absent,
    Failed(StorageError),
}

/// A store decorator that keeps committed mappings in memory.
///
/// Only positive answers are cached. A committed mapping never changes, so a
/// cached hit can't go stale; an absence or an `exists` answer can, so those
/// always go to the inner store. Concurrent misses for the same key coalesce
/// into a single fetch.
#[derive(Debug, Clone)]
pub struct CachedStore<R> {
    inner: R,
    cache: Cache<String, Mapping>,
}

impl<R: ReadStore> CachedStore<R> {
    /// Wraps `inner` with a cache of default size and no expiry.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, CacheConfig::default())
    }

    pub fn with_config(inner: R, config: CacheConfig) -> Self {
        let mut builder = Cache::builder().max_capacity(config.max_capacity);

        if let Some(ttl) = config.ttl {
            builder = builder.time_to_live(ttl);
        }

        if let Some(tti) = config.tti {
            builder = builder.time_to_idle(tti);
        }

        Self {
            inner,
            cache: builder.build(),
        }
    }

    /// Returns a reference to the inner store.
    pub fn inner(&self) -> &R {
        &self.inner
    }

    /// Whether a mapping for `code` is currently cached.
    pub fn is_cached(&self, code: &ShortCode) -> bool {
        self.cache.contains_key(code.store_key().as_str())
    }

    /// Drops a cached entry. The next read goes to the inner store.
    pub async fn invalidate(&self, code: &ShortCode) {
        trace!(code = %code, "invalidating cache entry");
        self.cache.invalidate(code.store_key().as_str()).await;
    }
}

#[async_trait]
impl<R: ReadStore> ReadStore for CachedStore<R> {
    async fn get(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        let key = code.store_key();

        if let Some(mapping) = self.cache.get(&key).await {
            trace!(code = %code, "cache hit");
            return Ok(Some(mapping));
        }

        let fetched = self
            .cache
            .try_get_with(key, async {
                trace!(code = %code, "cache miss, fetching from inner store");
                match self.inner.get(code).await {
                    Ok(Some(mapping)) => Ok(mapping),
                    Ok(None) => Err(Miss::Absent),
                    Err(err) => Err(Miss::Failed(err)),
                }
            })
            .await;

        match fetched {
            Ok(mapping) => {
                debug!(code = %code, "cached mapping");
                Ok(Some(mapping))
            }
            Err(miss) => match miss.as_ref() {
                Miss::Absent => Ok(None),
                Miss::Failed(err) => Err(err.clone()),
            },
        }
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        if self.is_cached(code) {
            trace!(code = %code, "cache hit indicates code exists");
            return Ok(true);
        }
        self.inner.exists(code).await
    }
}

#[async_trait]
impl<R: KvStore> KvStore for CachedStore<R> {
    async fn put_if_absent(&self, code: &ShortCode, mapping: &Mapping) -> Result<Committed> {
        let committed = self.inner.put_if_absent(code, mapping).await?;
        self.cache.insert(code.store_key(), mapping.clone()).await;
        Ok(committed)
    }
}
