use crate::Result;
use async_trait::async_trait;
use burrow_core::{Mapping, ShortCode};

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a short code to its stored mapping.
    /// Returns `None` if the code was never allocated.
    async fn resolve(&self, code: &ShortCode) -> Result<Option<Mapping>>;
}
