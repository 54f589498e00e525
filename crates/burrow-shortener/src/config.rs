use burrow_core::{AllocationError, Alphabet, Metadata};
use std::time::Duration;
use typed_builder::TypedBuilder;

/// Tuning knobs for [`ShortenerService`](crate::ShortenerService).
///
/// Everything the allocator needs is passed in here at construction time;
/// nothing is read from the process environment.
#[derive(Debug, Clone, TypedBuilder)]
pub struct AllocatorConfig {
    /// Symbols short codes are drawn from.
    #[builder(default)]
    pub alphabet: Alphabet,
    /// Number of symbols per short code.
    #[builder(default = 7)]
    pub code_length: usize,
    /// Candidates tried before giving up with
    /// [`AllocationError::CollisionRetryExhausted`].
    #[builder(default = 8)]
    pub max_attempts: u32,
    /// Extra tries of a single claim after a transient backend error.
    #[builder(default = 3)]
    pub backend_retries: u32,
    #[builder(default = Duration::from_millis(50))]
    pub initial_backoff: Duration,
    #[builder(default = Duration::from_secs(2))]
    pub max_backoff: Duration,
    /// Issue an `exists` probe before each claim. The probe only feeds logs.
    #[builder(default = false)]
    pub probe_existence: bool,
    /// Public prefix short URLs are served from, e.g. `https://sho.rt`.
    #[builder(default, setter(strip_option, into))]
    pub public_base_url: Option<String>,
    /// Metadata stored with every mapping unless the request overrides a key.
    #[builder(default)]
    pub default_metadata: Metadata,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl AllocatorConfig {
    pub fn validate(&self) -> Result<(), AllocationError> {
        if self.max_attempts == 0 {
            return Err(AllocationError::InvalidInput(
                "max_attempts must be at least 1".to_string(),
            ));
        }
        if self.code_length == 0 {
            return Err(AllocationError::InvalidInput(
                "code_length must be at least 1".to_string(),
            ));
        }
        if self.initial_backoff > self.max_backoff {
            return Err(AllocationError::InvalidInput(format!(
                "initial_backoff {:?} exceeds max_backoff {:?}",
                self.initial_backoff, self.max_backoff
            )));
        }
        Ok(())
    }
}
