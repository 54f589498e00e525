use async_trait::async_trait;
use burrow_core::store::{Committed, KvStore, ReadStore, Result};
use burrow_core::{Mapping, ShortCode, StorageError};
use ::redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;
use tracing::{trace, warn};
use typed_builder::TypedBuilder;

/// Connection settings for [`RedisStore`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct RedisStoreConfig {
    #[builder(setter(into))]
    pub url: String,
    /// Prepended to every store key, so several deployments can share one
    /// Redis database.
    #[builder(default = "burrow:".to_string(), setter(into))]
    pub namespace: String,
    /// Upper bound on a single round trip.
    #[builder(default = Duration::from_secs(2))]
    pub response_timeout: Duration,
}

/// A Redis implementation of [`KvStore`].
///
/// Mappings are stored as JSON strings. A claim is `SET key value NX`, which
/// Redis executes atomically: the reply is `OK` for the single winner and nil
/// for everyone else.
#[derive(Clone)]
pub struct RedisStore {
    conn: ::redis::aio::MultiplexedConnection,
    namespace: String,
    response_timeout: Duration,
}

impl std::fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore")
            .field("namespace", &self.namespace)
            .field("response_timeout", &self.response_timeout)
            .finish_non_exhaustive()
    }
}

fn map_redis_error(operation: &str, err: ::redis::RedisError) -> StorageError {
    let message = format!("{operation}: {err}");

    if matches!(err.code(), Some("NOPERM" | "NOAUTH" | "WRONGPASS")) {
        StorageError::PermissionDenied(message)
    } else if err.is_timeout() {
        StorageError::Timeout(message)
    } else if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
        StorageError::Unavailable(message)
    } else {
        StorageError::Operation(message)
    }
}

impl RedisStore {
    /// Creates a store over an existing multiplexed connection.
    pub fn new(
        conn: ::redis::aio::MultiplexedConnection,
        namespace: impl Into<String>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            conn,
            namespace: namespace.into(),
            response_timeout,
        }
    }

    /// Opens a connection described by `config`.
    pub async fn connect(config: &RedisStoreConfig) -> Result<Self> {
        let client = ::redis::Client::open(config.url.as_str())
            .map_err(|e| map_redis_error("invalid redis url", e))?;
        let conn = tokio::time::timeout(
            config.response_timeout,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| StorageError::Timeout("timed out connecting to redis".to_string()))?
        .map_err(|e| map_redis_error("failed to connect to redis", e))?;

        Ok(Self::new(
            conn,
            config.namespace.clone(),
            config.response_timeout,
        ))
    }

    fn key(&self, code: &ShortCode) -> String {
        format!("{}{}", self.namespace, code.store_key())
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: Future<Output = ::redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.response_timeout, fut).await {
            Ok(result) => result.map_err(|e| map_redis_error(operation, e)),
            Err(_) => Err(StorageError::Timeout(format!(
                "{operation}: no reply within {:?}",
                self.response_timeout
            ))),
        }
    }
}

#[async_trait]
impl ReadStore for RedisStore {
    async fn get(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        let key = self.key(code);
        let mut conn = self.conn.clone();

        let raw = self
            .bounded(
                "failed to fetch value from redis",
                conn.get::<_, Option<String>>(&key),
            )
            .await?;

        let Some(raw) = raw else {
            return Ok(None);
        };

        serde_json::from_str::<Mapping>(&raw).map(Some).map_err(|e| {
            warn!(key = %key, error = %e, "stored mapping is not valid json");
            StorageError::InvalidData(format!("invalid value for key '{key}': {e}"))
        })
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let key = self.key(code);
        let mut conn = self.conn.clone();

        self.bounded("failed to probe key in redis", conn.exists::<_, bool>(&key))
            .await
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn put_if_absent(&self, code: &ShortCode, mapping: &Mapping) -> Result<Committed> {
        let key = self.key(code);
        let json = serde_json::to_string(mapping)
            .map_err(|e| StorageError::InvalidData(format!("failed to serialize mapping: {e}")))?;

        let mut conn = self.conn.clone();
        let cmd = {
            let mut cmd = ::redis::cmd("SET");
            cmd.arg(&key).arg(json).arg("NX");
            cmd
        };

        let reply = self
            .bounded(
                "failed to claim key in redis",
                cmd.query_async::<Option<String>>(&mut conn),
            )
            .await?;

        match reply {
            Some(_) => {
                trace!(key = %key, "claimed key in redis");
                Ok(Committed)
            }
            None => Err(StorageError::AlreadyExists(key)),
        }
    }
}
