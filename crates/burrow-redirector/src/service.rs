use std::sync::Arc;

use crate::redirector::Redirector;
use async_trait::async_trait;
use burrow_core::{Alphabet, Mapping, ReadStore, ShortCode};
use tracing::{debug, trace};

/// Service for resolving short codes.
///
/// Resolution is a pure read: it never writes to the store, so resolving the
/// same code any number of times returns the same mapping.
#[derive(Debug)]
pub struct RedirectorService<R> {
    store: Arc<R>,
    alphabet: Alphabet,
    code_length: usize,
}

impl<R> Clone for RedirectorService<R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            alphabet: self.alphabet.clone(),
            code_length: self.code_length,
        }
    }
}

impl<R: ReadStore> RedirectorService<R> {
    /// Creates a service accepting codes of the default shape: seven symbols
    /// from `[a-z0-9]`.
    pub fn new(store: R) -> Self {
        Self::with_code_format(store, Alphabet::default(), 7)
    }

    /// Creates a service accepting codes of `code_length` symbols drawn from
    /// `alphabet`.
    pub fn with_code_format(store: R, alphabet: Alphabet, code_length: usize) -> Self {
        Self {
            store: Arc::new(store),
            alphabet,
            code_length,
        }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Resolves a short code to its mapping.
    ///
    /// * `Ok(Some(mapping))` - the code was allocated
    /// * `Ok(None)` - no mapping exists for the code
    /// * `Err(e)` - the store could not be read
    pub async fn resolve(&self, code: &ShortCode) -> crate::Result<Option<Mapping>> {
        Redirector::resolve(self, code).await
    }

    /// Validates raw user input against the configured code shape, then
    /// resolves it.
    pub async fn resolve_str(&self, raw: &str) -> crate::Result<Option<Mapping>> {
        let code = ShortCode::parse(raw, &self.alphabet, self.code_length)?;
        self.resolve(&code).await
    }
}

#[async_trait]
impl<R: ReadStore> Redirector for RedirectorService<R> {
    async fn resolve(&self, code: &ShortCode) -> crate::Result<Option<Mapping>> {
        trace!(code = %code, "resolving short code");

        match self.store.get(code).await? {
            Some(mapping) => {
                debug!(code = %code, target = %mapping.target, "resolved short code");
                Ok(Some(mapping))
            }
            None => {
                trace!(code = %code, "short code not found");
                Ok(None)
            }
        }
    }
}
