use crate::backoff::Backoff;
use crate::config::AllocatorConfig;
use async_trait::async_trait;
use burrow_core::{
    AllocationError, Committed, KvStore, Mapping, Metadata, ShortCode, ShortenRequest,
    ShortenResponse, Shortener, StorageError,
};
use burrow_generator::{Generator, RandomGenerator, RandomGeneratorSettings};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

type Result<T> = std::result::Result<T, AllocationError>;

/// Outcome of one claim attempt for a single candidate.
enum Claim {
    Committed,
    Collision,
}

/// Allocates short codes and persists their mappings.
///
/// Each call draws candidates from the generator and claims them through
/// [`KvStore::put_if_absent`]; the first successful claim wins. The service
/// never checks for existence before writing: that answer would be stale
/// under concurrency, so the conditional write is the only uniqueness guard.
#[derive(Debug)]
pub struct ShortenerService<S, G = RandomGenerator> {
    store: Arc<S>,
    generator: Arc<G>,
    config: Arc<AllocatorConfig>,
}

impl<S, G> Clone for ShortenerService<S, G> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            generator: Arc::clone(&self.generator),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S: KvStore> ShortenerService<S, RandomGenerator> {
    /// Creates a service drawing codes from the OS CSPRNG, shaped by the
    /// alphabet and length in `config`.
    pub fn new(store: S, config: AllocatorConfig) -> Result<Self> {
        let settings = RandomGeneratorSettings::builder()
            .alphabet(config.alphabet.clone())
            .length(config.code_length)
            .build();
        Self::with_generator(store, RandomGenerator::new(settings), config)
    }
}

impl<S: KvStore, G: Generator> ShortenerService<S, G> {
    /// Creates a service with a custom generator.
    pub fn with_generator(store: S, generator: G, config: AllocatorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: Arc::new(store),
            generator: Arc::new(generator),
            config: Arc::new(config),
        })
    }

    pub fn config(&self) -> &AllocatorConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Allocates a short code for `target` using the configured attempt
    /// budget.
    pub async fn allocate(&self, target: &str, metadata: Metadata) -> Result<(ShortCode, Mapping)> {
        self.allocate_with(
            target,
            metadata,
            self.config.max_attempts,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`allocate`](Self::allocate), but gives up with
    /// [`AllocationError::Cancelled`] once `deadline` has passed. The deadline
    /// is only observed between attempts.
    pub async fn allocate_within(
        &self,
        target: &str,
        metadata: Metadata,
        deadline: Duration,
    ) -> Result<(ShortCode, Mapping)> {
        let cancel = CancellationToken::new();
        let timer = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                cancel.cancel();
            })
        };

        let result = self
            .allocate_with(target, metadata, self.config.max_attempts, &cancel)
            .await;
        timer.abort();
        result
    }

    /// Allocates a short code for `target`, trying at most `max_attempts`
    /// candidates.
    ///
    /// On success exactly one new mapping has been persisted. `cancel` is
    /// checked before every claim and while backing off; a claim that has
    /// been sent to the store is always awaited to completion.
    pub async fn allocate_with(
        &self,
        target: &str,
        metadata: Metadata,
        max_attempts: u32,
        cancel: &CancellationToken,
    ) -> Result<(ShortCode, Mapping)> {
        if target.trim().is_empty() {
            return Err(AllocationError::InvalidInput(
                "target must not be empty".to_string(),
            ));
        }
        if max_attempts == 0 {
            return Err(AllocationError::InvalidInput(
                "max_attempts must be at least 1".to_string(),
            ));
        }

        let mapping = Mapping::new(target, self.merge_metadata(metadata));

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                debug!(attempt, "allocation cancelled");
                return Err(AllocationError::Cancelled);
            }

            let code = self
                .generator
                .generate()
                .map_err(|e| AllocationError::Generator(e.to_string()))?;

            if self.config.probe_existence {
                self.probe(&code).await;
            }

            match self.claim(&code, &mapping, cancel).await? {
                Claim::Committed => {
                    info!(code = %code, attempt, "allocated short code");
                    return Ok((code, mapping));
                }
                Claim::Collision => {
                    debug!(code = %code, attempt, max_attempts, "short code collision, retrying");
                }
            }
        }

        warn!(
            attempts = max_attempts,
            "collision retry budget exhausted; keyspace may be saturated"
        );
        Err(AllocationError::CollisionRetryExhausted {
            attempts: max_attempts,
        })
    }

    fn merge_metadata(&self, request: Metadata) -> Metadata {
        let mut merged = self.config.default_metadata.clone();
        merged.extend(request);
        merged
    }

    /// Telemetry-only existence check. Its answer never decides anything.
    async fn probe(&self, code: &ShortCode) {
        match self.store.exists(code).await {
            Ok(true) => debug!(code = %code, "probe reports candidate taken"),
            Ok(false) => trace!(code = %code, "probe reports candidate free"),
            Err(e) => warn!(code = %code, error = %e, "existence probe failed"),
        }
    }

    /// Claims one candidate, retrying transient backend failures on the same
    /// key.
    ///
    /// A transient failure is ambiguous: the write may have landed before the
    /// error was reported. Once that has happened, every way out of this
    /// function that isn't a clean commit first reads the key back, so a
    /// mapping we did persist is always reported as committed.
    async fn claim(
        &self,
        code: &ShortCode,
        mapping: &Mapping,
        cancel: &CancellationToken,
    ) -> Result<Claim> {
        let mut backoff = Backoff::new(self.config.initial_backoff, self.config.max_backoff);
        let mut retries = 0;
        let mut ambiguous = false;

        loop {
            let err = match self.store.put_if_absent(code, mapping).await {
                Ok(Committed) => return Ok(Claim::Committed),
                Err(StorageError::AlreadyExists(_)) if !ambiguous => {
                    return Ok(Claim::Collision);
                }
                Err(StorageError::AlreadyExists(_)) => {
                    return match self.store.get(code).await {
                        Ok(stored) if stored.as_ref() == Some(mapping) => {
                            debug!(code = %code, "earlier ambiguous claim had committed");
                            Ok(Claim::Committed)
                        }
                        Ok(_) => Ok(Claim::Collision),
                        Err(read_err) => {
                            warn!(code = %code, error = %read_err, "read-back after ambiguous claim failed");
                            Err(read_err.into())
                        }
                    };
                }
                Err(err) => err,
            };

            if !err.is_transient() {
                warn!(code = %code, error = %err, "claim failed");
                return self.settle(code, mapping, ambiguous, err.into()).await;
            }

            ambiguous = true;
            if retries >= self.config.backend_retries {
                warn!(code = %code, retries, error = %err, "storage backend unavailable");
                let failure = AllocationError::BackendUnavailable(err.to_string());
                return self.settle(code, mapping, ambiguous, failure).await;
            }
            retries += 1;

            let delay = backoff.next_delay();
            warn!(
                code = %code,
                retry = retries,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "transient storage error, backing off"
            );
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(code = %code, "allocation cancelled during backoff");
                    return self.settle(code, mapping, ambiguous, AllocationError::Cancelled).await;
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Resolves a failing claim. After an ambiguous write the key is read back
    /// once: finding our own mapping turns the failure into a commit.
    async fn settle(
        &self,
        code: &ShortCode,
        mapping: &Mapping,
        ambiguous: bool,
        failure: AllocationError,
    ) -> Result<Claim> {
        if !ambiguous {
            return Err(failure);
        }

        match self.store.get(code).await {
            Ok(Some(stored)) if stored == *mapping => {
                info!(code = %code, "ambiguous claim had committed");
                Ok(Claim::Committed)
            }
            Ok(_) => Err(failure),
            Err(read_err) => {
                warn!(
                    code = %code,
                    error = %read_err,
                    "could not verify ambiguous claim; a mapping may remain"
                );
                Err(failure)
            }
        }
    }
}

#[async_trait]
impl<S: KvStore, G: Generator> Shortener for ShortenerService<S, G> {
    async fn shorten(&self, request: ShortenRequest) -> Result<ShortenResponse> {
        let (code, mapping) = self.allocate(&request.target, request.metadata).await?;

        Ok(ShortenResponse {
            short_url: self
                .config
                .public_base_url
                .as_deref()
                .map(|base| code.to_url(base)),
            short_code: code.as_str().to_owned(),
            target: mapping.target,
            created_at: mapping.created_at,
        })
    }
}
