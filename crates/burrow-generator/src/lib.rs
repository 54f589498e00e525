pub mod random;
#[cfg(any(test, feature = "test-util"))]
pub mod scripted;

pub use random::{RandomGenerator, RandomGeneratorSettings};
#[cfg(any(test, feature = "test-util"))]
pub use scripted::ScriptedGenerator;

use burrow_core::ShortCode;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum GeneratorError {
    #[error("entropy source failed: {0}")]
    Entropy(String),
    #[error("generator exhausted")]
    Exhausted,
}

/// Trait for generating candidate short codes.
///
/// Implementations are pure generators that don't interact with storage: a
/// candidate is only an identifier once a store has claimed it.
pub trait Generator: Send + Sync + 'static {
    /// Draws the next candidate.
    fn generate(&self) -> Result<ShortCode, GeneratorError>;
}

impl<G: Generator + ?Sized> Generator for std::sync::Arc<G> {
    fn generate(&self) -> Result<ShortCode, GeneratorError> {
        (**self).generate()
    }
}
