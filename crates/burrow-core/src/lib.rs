//! Core types and traits for the Burrow URL shortener.
//!
//! This crate provides the types shared by the allocator, the storage
//! adapters and the redirector: short codes and their alphabet, the persisted
//! [`Mapping`], the key-value store contract and the error taxonomy.

pub mod alphabet;
pub mod error;
pub mod mapping;
pub mod shortcode;
pub mod shortener;
pub mod store;

pub use alphabet::Alphabet;
pub use error::{AllocationError, CoreError, StorageError};
pub use mapping::{Mapping, Metadata};
pub use shortcode::ShortCode;
pub use shortener::{ShortenRequest, ShortenResponse, Shortener};
pub use store::{Committed, KvStore, ReadStore};
