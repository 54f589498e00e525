//! Key-value store adapters for Burrow.
//!
//! Every adapter implements [`KvStore`], whose `put_if_absent` is a single
//! atomic conditional write at the backend:
//!
//! - [`InMemoryStore`]: a sharded in-process map, for tests and single-node use.
//! - [`MySqlStore`]: an `INSERT` guarded by the primary key.
//! - [`RedisStore`]: `SET ... NX`.

pub mod memory;
pub mod mysql;
pub mod redis;

pub use burrow_core::store::{Committed, KvStore, ReadStore, Result};
pub use burrow_core::StorageError;
pub use memory::InMemoryStore;
pub use mysql::{MySqlStore, MySqlStoreConfig};
pub use self::redis::{RedisStore, RedisStoreConfig};
