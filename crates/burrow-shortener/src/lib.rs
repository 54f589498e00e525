//! Short code allocation for Burrow.
//!
//! [`ShortenerService`] turns a target URL into a freshly claimed short code.
//! Uniqueness is delegated entirely to the store's atomic conditional write;
//! the service itself keeps no state between calls and can be cloned across
//! tasks or run on any number of nodes against the same store.

pub mod backoff;
pub mod config;
pub mod service;

pub use burrow_core::AllocationError;
pub use config::AllocatorConfig;
pub use service::ShortenerService;
