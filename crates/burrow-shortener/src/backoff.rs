use rand::Rng;
use std::time::Duration;

/// Exponential backoff with additive jitter.
///
/// Each delay is the current base plus a random jitter of up to half the
/// base; the base doubles after every call, capped at `max`.
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    max: Duration,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            current: initial.min(max),
            max,
        }
    }

    /// Returns the next delay and advances the schedule.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.current;
        let jitter_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX) / 2;
        // rng is created here so nothing non-Send lives across an await
        let jitter = Duration::from_millis(rand::rng().random_range(0..=jitter_ms));

        self.current = self.current.saturating_mul(2).min(self.max);
        base.saturating_add(jitter)
            .min(self.max.saturating_add(self.max / 2))
    }
}
