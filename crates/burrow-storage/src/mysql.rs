use async_trait::async_trait;
use burrow_core::store::{Committed, KvStore, ReadStore, Result};
use burrow_core::{Mapping, Metadata, ShortCode, StorageError};
use jiff::Timestamp;
use sqlx::mysql::{MySqlDatabaseError, MySqlPoolOptions};
use sqlx::{MySqlPool, Row};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

const SCHEMA: &str = include_str!("../ddl/mysql/short_links.sql");

// MySQL server error numbers.
const ER_DBACCESS_DENIED: u16 = 1044;
const ER_ACCESS_DENIED: u16 = 1045;
const ER_TABLEACCESS_DENIED: u16 = 1142;
const ER_COLUMNACCESS_DENIED: u16 = 1143;
const ER_SPECIFIC_ACCESS_DENIED: u16 = 1227;
const ER_LOCK_WAIT_TIMEOUT: u16 = 1205;
const ER_LOCK_DEADLOCK: u16 = 1213;

/// Connection settings for [`MySqlStore`].
#[derive(Debug, Clone, TypedBuilder)]
pub struct MySqlStoreConfig {
    #[builder(setter(into))]
    pub database_url: String,
    #[builder(default = 10)]
    pub max_connections: u32,
    /// How long a query may wait for a pooled connection.
    #[builder(default = Duration::from_secs(5))]
    pub acquire_timeout: Duration,
    /// Upper bound on a single query, connection wait included.
    #[builder(default = DEFAULT_QUERY_TIMEOUT)]
    pub query_timeout: Duration,
}

const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// MySQL implementation of the store contract.
///
/// A claim is a single `INSERT` into `short_links`; the primary key on
/// `short_key` makes the database reject the second writer of a key, which
/// surfaces as [`StorageError::AlreadyExists`]. Rows are never updated.
#[derive(Debug, Clone)]
pub struct MySqlStore {
    pool: MySqlPool,
    query_timeout: Duration,
}

impl MySqlStore {
    /// Creates a store from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self {
            pool,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }

    pub fn with_query_timeout(mut self, query_timeout: Duration) -> Self {
        self.query_timeout = query_timeout;
        self
    }

    /// Creates a store by opening a new MySQL connection pool.
    pub async fn connect(config: &MySqlStoreConfig) -> Result<Self> {
        debug!(
            max_connections = config.max_connections,
            "connecting to mysql"
        );
        let pool = MySqlPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout)
            .connect(&config.database_url)
            .await
            .map_err(map_sqlx_error)?;
        Ok(Self::new(pool).with_query_timeout(config.query_timeout))
    }

    /// Creates the `short_links` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        bounded(
            self.query_timeout,
            "create schema",
            sqlx::query(SCHEMA).execute(&self.pool),
        )
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

/// Runs `fut` with a deadline. An elapsed deadline is reported as a pool
/// timeout, which maps to [`StorageError::Timeout`]: the statement may or may
/// not have been applied.
async fn bounded<T, F>(timeout: Duration, operation: &str, fut: F) -> sqlx::Result<T>
where
    F: Future<Output = sqlx::Result<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, timeout_ms = timeout.as_millis() as u64, "mysql query timed out");
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

fn encode_created_at(ts: Timestamp) -> Result<i64> {
    i64::try_from(ts.as_nanosecond()).map_err(|_| {
        StorageError::InvalidData(format!("created_at '{ts}' does not fit in 64 bits"))
    })
}

fn decode_created_at(nanos: i64) -> Result<Timestamp> {
    Timestamp::from_nanosecond(i128::from(nanos)).map_err(|e| {
        StorageError::InvalidData(format!("invalid created_at timestamp '{nanos}': {e}"))
    })
}

fn decode_metadata(raw: &str) -> Result<Metadata> {
    serde_json::from_str(raw)
        .map_err(|e| StorageError::InvalidData(format!("invalid metadata column: {e}")))
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(sqlx::error::DatabaseError::is_unique_violation)
}

fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    err.as_database_error()
        .and_then(|db| db.try_downcast_ref::<MySqlDatabaseError>())
        .map(MySqlDatabaseError::number)
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    if let Some(number) = mysql_error_number(&err) {
        return match number {
            ER_DBACCESS_DENIED
            | ER_ACCESS_DENIED
            | ER_TABLEACCESS_DENIED
            | ER_COLUMNACCESS_DENIED
            | ER_SPECIFIC_ACCESS_DENIED => StorageError::PermissionDenied(message),
            ER_LOCK_WAIT_TIMEOUT | ER_LOCK_DEADLOCK => StorageError::Query(message),
            _ => StorageError::Operation(message),
        };
    }

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        sqlx::Error::Configuration(_) => StorageError::Operation(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl ReadStore for MySqlStore {
    async fn get(&self, code: &ShortCode) -> Result<Option<Mapping>> {
        let query = sqlx::query(
            r#"
            SELECT target, metadata, created_at
            FROM short_links
            WHERE short_key = ?
            LIMIT 1
            "#,
        )
        .bind(code.store_key());
        let row = bounded(self.query_timeout, "get", query.fetch_optional(&self.pool))
            .await
            .map_err(map_sqlx_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let target: String = row.try_get("target").map_err(map_sqlx_error)?;
        let metadata_raw: String = row.try_get("metadata").map_err(map_sqlx_error)?;
        let created_at_raw: i64 = row.try_get("created_at").map_err(map_sqlx_error)?;

        Ok(Some(Mapping {
            target,
            created_at: decode_created_at(created_at_raw)?,
            metadata: decode_metadata(&metadata_raw)?,
        }))
    }

    async fn exists(&self, code: &ShortCode) -> Result<bool> {
        let query = sqlx::query(
            r#"
            SELECT 1
            FROM short_links
            WHERE short_key = ?
            LIMIT 1
            "#,
        )
        .bind(code.store_key());
        let row = bounded(self.query_timeout, "exists", query.fetch_optional(&self.pool))
            .await
            .map_err(map_sqlx_error)?;

        Ok(row.is_some())
    }
}

#[async_trait]
impl KvStore for MySqlStore {
    async fn put_if_absent(&self, code: &ShortCode, mapping: &Mapping) -> Result<Committed> {
        let key = code.store_key();
        let created_at = encode_created_at(mapping.created_at)?;
        let metadata = serde_json::to_string(&mapping.metadata)
            .map_err(|e| StorageError::InvalidData(format!("unserializable metadata: {e}")))?;

        let query = sqlx::query(
            r#"
            INSERT INTO short_links (short_key, target, metadata, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&key)
        .bind(&mapping.target)
        .bind(metadata)
        .bind(created_at);
        let result = bounded(self.query_timeout, "insert", query.execute(&self.pool)).await;

        match result {
            Ok(_) => {
                trace!(key = %key, "claimed key in mysql");
                Ok(Committed)
            }
            Err(err) if is_unique_violation(&err) => Err(StorageError::AlreadyExists(key)),
            Err(err) => Err(map_sqlx_error(err)),
        }
    }
}
