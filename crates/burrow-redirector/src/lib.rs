//! Resolution path for short codes.
//!
//! [`RedirectorService`] looks up the mapping behind a short code through any
//! [`ReadStore`](burrow_core::ReadStore). Wrapping the store in a
//! [`CachedStore`] adds an in-memory read-through cache.
//!
//! ```rust
//! use burrow_core::{KvStore, Mapping, Metadata, ShortCode};
//! use burrow_redirector::{CachedStore, RedirectorService};
//! use burrow_storage::InMemoryStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = InMemoryStore::new();
//! let code = ShortCode::new_unchecked("abc1234");
//! store
//!     .put_if_absent(&code, &Mapping::new("https://example.com", Metadata::new()))
//!     .await?;
//!
//! let service = RedirectorService::new(CachedStore::new(store));
//! if let Some(mapping) = service.resolve_str("abc1234").await? {
//!     println!("redirect to {}", mapping.target);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cached;
pub mod error;
pub mod redirector;
pub mod service;

pub use cached::{CacheConfig, CachedStore};
pub use error::{RedirectorError, Result};
pub use redirector::Redirector;
pub use service::RedirectorService;
