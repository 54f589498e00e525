mod common;

use burrow_core::{AllocationError, Alphabet, Metadata, ReadStore, ShortCode, StorageError};
use burrow_generator::{RandomGenerator, ScriptedGenerator};
use burrow_shortener::{AllocatorConfig, ShortenerService};
use burrow_storage::InMemoryStore;
use common::{code, occupy, FaultyStore, PutFault};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const TARGET: &str = "https://example.com/page";

fn fast_config() -> AllocatorConfig {
    AllocatorConfig::builder()
        .initial_backoff(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(4))
        .build()
}

fn service<S: burrow_core::KvStore>(
    store: S,
    script: &[&str],
    config: AllocatorConfig,
) -> ShortenerService<S, ScriptedGenerator> {
    ShortenerService::with_generator(store, ScriptedGenerator::new(script.iter().copied()), config)
        .unwrap()
}

#[tokio::test]
async fn empty_store_allocates_a_seven_symbol_code() {
    let service = ShortenerService::new(InMemoryStore::new(), fast_config()).unwrap();

    let (short_code, mapping) = service
        .allocate_with(TARGET, Metadata::new(), 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(short_code.as_str().len(), 7);
    assert!(short_code
        .as_str()
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    assert_eq!(service.store().len(), 1);

    let stored = service.store().get(&short_code).await.unwrap().unwrap();
    assert_eq!(stored.target, TARGET);
    assert_eq!(stored, mapping);
}

#[tokio::test]
async fn succeeds_on_fourth_attempt_after_three_collisions() {
    let store = InMemoryStore::new();
    occupy(&store, &["aaaaaaa", "bbbbbbb", "ccccccc"]).await;
    let service = service(
        store,
        &["aaaaaaa", "bbbbbbb", "ccccccc", "ddddddd", "eeeeeee"],
        fast_config(),
    );

    let (short_code, _) = service
        .allocate_with(TARGET, Metadata::new(), 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(short_code.as_str(), "ddddddd");
    assert_eq!(service.store().len(), 4);

    // Collided keys keep their original targets.
    let first = service.store().get(&code("aaaaaaa")).await.unwrap().unwrap();
    assert_eq!(first.target, "https://occupied.example/aaaaaaa");
}

#[tokio::test]
async fn collision_on_every_attempt_exhausts_the_budget() {
    let store = InMemoryStore::new();
    occupy(&store, &["aaaaaaa"]).await;
    let service = ShortenerService::with_generator(
        store,
        ScriptedGenerator::cycling(["aaaaaaa"]),
        fast_config(),
    )
    .unwrap();

    let err = service
        .allocate_with(TARGET, Metadata::new(), 5, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AllocationError::CollisionRetryExhausted { attempts: 5 }
    ));
    assert_eq!(service.store().len(), 1);
    let kept = service.store().get(&code("aaaaaaa")).await.unwrap().unwrap();
    assert_eq!(kept.target, "https://occupied.example/aaaaaaa");
}

#[tokio::test]
async fn configured_attempt_budget_is_used_by_allocate() {
    let store = InMemoryStore::new();
    occupy(&store, &["aaaaaaa"]).await;
    let config = AllocatorConfig::builder().max_attempts(3).build();
    let service =
        ShortenerService::with_generator(store, ScriptedGenerator::cycling(["aaaaaaa"]), config)
            .unwrap();

    let err = service.allocate(TARGET, Metadata::new()).await.unwrap_err();

    assert!(matches!(
        err,
        AllocationError::CollisionRetryExhausted { attempts: 3 }
    ));
}

#[tokio::test]
async fn permission_denied_probe_is_not_taken_as_absence() {
    let store = FaultyStore::new().failing_exists(StorageError::PermissionDenied("403".into()));
    occupy(store.inner(), &["aaaaaaa"]).await;
    let config = AllocatorConfig::builder().probe_existence(true).build();
    let service = service(store, &["aaaaaaa", "bbbbbbb"], config);

    let (short_code, _) = service.allocate(TARGET, Metadata::new()).await.unwrap();

    // The probe failed for both candidates, yet the taken one was still
    // detected by the conditional write and left alone.
    assert_eq!(short_code.as_str(), "bbbbbbb");
    assert_eq!(service.store().exists_calls(), 2);
    let kept = service.store().get(&code("aaaaaaa")).await.unwrap().unwrap();
    assert_eq!(kept.target, "https://occupied.example/aaaaaaa");
}

#[tokio::test]
async fn permission_denied_probe_with_only_collisions_still_exhausts() {
    let store = FaultyStore::new().failing_exists(StorageError::PermissionDenied("403".into()));
    occupy(store.inner(), &["aaaaaaa"]).await;
    let config = AllocatorConfig::builder().probe_existence(true).build();
    let service =
        ShortenerService::with_generator(store, ScriptedGenerator::cycling(["aaaaaaa"]), config)
            .unwrap();

    let err = service
        .allocate_with(TARGET, Metadata::new(), 5, &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        AllocationError::CollisionRetryExhausted { attempts: 5 }
    ));
    assert_eq!(service.store().inner().len(), 1);
}

#[tokio::test]
async fn probe_is_skipped_by_default() {
    let service = service(FaultyStore::new(), &["aaaaaaa"], fast_config());

    service.allocate(TARGET, Metadata::new()).await.unwrap();

    assert_eq!(service.store().exists_calls(), 0);
}

#[tokio::test]
async fn transient_errors_retry_the_same_candidate() {
    let store = FaultyStore::with_put_faults([
        PutFault::Fail(StorageError::Unavailable("connection reset".into())),
        PutFault::Fail(StorageError::Unavailable("connection reset".into())),
    ]);
    let service = service(store, &["aaaaaaa", "bbbbbbb"], fast_config());

    let (short_code, _) = service.allocate(TARGET, Metadata::new()).await.unwrap();

    assert_eq!(short_code.as_str(), "aaaaaaa");
    assert_eq!(service.store().put_calls(), 3);
    assert_eq!(service.store().inner().len(), 1);
}

#[tokio::test]
async fn exhausted_backend_retries_surface_as_unavailable() {
    let faults = (0..10).map(|_| PutFault::Fail(StorageError::Unavailable("down".into())));
    let config = AllocatorConfig::builder()
        .backend_retries(2)
        .initial_backoff(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(2))
        .build();
    let service = service(FaultyStore::with_put_faults(faults), &["aaaaaaa"], config);

    let err = service.allocate(TARGET, Metadata::new()).await.unwrap_err();

    assert!(matches!(err, AllocationError::BackendUnavailable(_)));
    assert_eq!(service.store().put_calls(), 3);
    assert!(service.store().inner().is_empty());
}

#[tokio::test]
async fn permission_denied_claim_fails_immediately() {
    let store = FaultyStore::with_put_faults([PutFault::Fail(StorageError::PermissionDenied(
        "AccessDenied".into(),
    ))]);
    let service = service(store, &["aaaaaaa", "bbbbbbb"], fast_config());

    let err = service.allocate(TARGET, Metadata::new()).await.unwrap_err();

    assert!(matches!(err, AllocationError::BackendPermissionDenied(_)));
    assert_eq!(service.store().put_calls(), 1);
    assert!(service.store().inner().is_empty());
}

#[tokio::test]
async fn corrupt_backend_data_is_a_hard_failure() {
    let store = FaultyStore::with_put_faults([PutFault::Fail(StorageError::InvalidData(
        "garbage".into(),
    ))]);
    let service = service(store, &["aaaaaaa"], fast_config());

    let err = service.allocate(TARGET, Metadata::new()).await.unwrap_err();

    assert!(matches!(err, AllocationError::Storage(_)));
    assert_eq!(service.store().put_calls(), 1);
}

#[tokio::test]
async fn ambiguous_timeout_that_committed_is_recognised_as_ours() {
    let store = FaultyStore::with_put_faults([PutFault::CommitThenFail(StorageError::Timeout(
        "reply lost".into(),
    ))]);
    let service = service(store, &["aaaaaaa", "bbbbbbb"], fast_config());

    let (short_code, mapping) = service.allocate(TARGET, Metadata::new()).await.unwrap();

    assert_eq!(short_code.as_str(), "aaaaaaa");
    assert_eq!(service.store().put_calls(), 2);
    assert_eq!(service.store().inner().len(), 1);
    let stored = service.store().get(&short_code).await.unwrap().unwrap();
    assert_eq!(stored, mapping);
}

#[tokio::test]
async fn transient_error_then_foreign_record_counts_as_collision() {
    let store = FaultyStore::with_put_faults([PutFault::Fail(StorageError::Timeout(
        "reply lost".into(),
    ))]);
    occupy(store.inner(), &["aaaaaaa"]).await;
    let service = service(store, &["aaaaaaa", "bbbbbbb"], fast_config());

    let (short_code, _) = service.allocate(TARGET, Metadata::new()).await.unwrap();

    assert_eq!(short_code.as_str(), "bbbbbbb");
    assert_eq!(service.store().put_calls(), 3);
    assert_eq!(service.store().inner().len(), 2);
    let kept = service.store().get(&code("aaaaaaa")).await.unwrap().unwrap();
    assert_eq!(kept.target, "https://occupied.example/aaaaaaa");
}

#[tokio::test]
async fn committed_write_is_reported_even_when_retries_run_out() {
    let store = FaultyStore::with_put_faults([
        PutFault::CommitThenFail(StorageError::Timeout("reply lost".into())),
        PutFault::Fail(StorageError::Unavailable("down".into())),
        PutFault::Fail(StorageError::Unavailable("down".into())),
    ]);
    let config = AllocatorConfig::builder()
        .backend_retries(2)
        .initial_backoff(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(2))
        .build();
    let service = service(store, &["aaaaaaa", "bbbbbbb"], config);

    let (short_code, mapping) = service.allocate(TARGET, Metadata::new()).await.unwrap();

    assert_eq!(short_code.as_str(), "aaaaaaa");
    assert_eq!(service.store().put_calls(), 3);
    assert_eq!(service.store().inner().len(), 1);
    let stored = service.store().inner().get(&short_code).await.unwrap();
    assert_eq!(stored, Some(mapping));
}

#[tokio::test]
async fn committed_write_after_non_transient_error_is_reported() {
    let store = FaultyStore::with_put_faults([
        PutFault::CommitThenFail(StorageError::Unavailable("connection reset".into())),
        PutFault::Fail(StorageError::PermissionDenied("revoked".into())),
    ]);
    let service = service(store, &["aaaaaaa"], fast_config());

    let (short_code, _) = service.allocate(TARGET, Metadata::new()).await.unwrap();

    assert_eq!(short_code.as_str(), "aaaaaaa");
    assert_eq!(service.store().put_calls(), 2);
}

#[tokio::test]
async fn unverifiable_ambiguous_write_keeps_the_failure() {
    let faults = (0..3).map(|_| PutFault::Fail(StorageError::Unavailable("down".into())));
    let config = AllocatorConfig::builder()
        .backend_retries(2)
        .initial_backoff(Duration::from_millis(1))
        .max_backoff(Duration::from_millis(2))
        .build();
    let store = FaultyStore::with_put_faults(faults)
        .failing_get(StorageError::Unavailable("reads down too".into()));
    let service = service(store, &["aaaaaaa"], config);

    let err = service.allocate(TARGET, Metadata::new()).await.unwrap_err();

    assert!(matches!(err, AllocationError::BackendUnavailable(_)));
    assert!(service.store().inner().is_empty());
}

#[tokio::test(start_paused = true)]
async fn committed_write_is_reported_when_cancelled_during_backoff() {
    let store = FaultyStore::with_put_faults([PutFault::CommitThenFail(StorageError::Timeout(
        "reply lost".into(),
    ))]);
    let config = AllocatorConfig::builder()
        .initial_backoff(Duration::from_secs(30))
        .max_backoff(Duration::from_secs(60))
        .build();
    let service = service(store, &["aaaaaaa"], config);

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let (short_code, mapping) = service
        .allocate_with(TARGET, Metadata::new(), 5, &cancel)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(short_code.as_str(), "aaaaaaa");
    assert_eq!(service.store().put_calls(), 1);
    let stored = service.store().inner().get(&short_code).await.unwrap();
    assert_eq!(stored, Some(mapping));
}

#[tokio::test]
async fn unbounded_max_backoff_does_not_overflow() {
    let store = FaultyStore::with_put_faults([PutFault::Fail(StorageError::Unavailable(
        "blip".into(),
    ))]);
    let config = AllocatorConfig::builder()
        .initial_backoff(Duration::from_millis(1))
        .max_backoff(Duration::MAX)
        .build();
    let service = service(store, &["aaaaaaa"], config);

    let (short_code, _) = service.allocate(TARGET, Metadata::new()).await.unwrap();

    assert_eq!(short_code.as_str(), "aaaaaaa");
    assert_eq!(service.store().put_calls(), 2);
}

#[tokio::test]
async fn cancelled_token_stops_before_any_claim() {
    let service = service(FaultyStore::new(), &["aaaaaaa"], fast_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let err = service
        .allocate_with(TARGET, Metadata::new(), 5, &cancel)
        .await
        .unwrap_err();

    assert!(matches!(err, AllocationError::Cancelled));
    assert_eq!(service.store().put_calls(), 0);
    assert!(service.store().inner().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff() {
    let faults = (0..10).map(|_| PutFault::Fail(StorageError::Unavailable("down".into())));
    let config = AllocatorConfig::builder()
        .backend_retries(10)
        .initial_backoff(Duration::from_secs(30))
        .max_backoff(Duration::from_secs(60))
        .build();
    let service = service(FaultyStore::with_put_faults(faults), &["aaaaaaa"], config);

    let cancel = CancellationToken::new();
    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            cancel.cancel();
        })
    };

    let err = service
        .allocate_with(TARGET, Metadata::new(), 5, &cancel)
        .await
        .unwrap_err();
    canceller.await.unwrap();

    assert!(matches!(err, AllocationError::Cancelled));
    assert_eq!(service.store().put_calls(), 1);
    assert!(service.store().inner().is_empty());
}

#[tokio::test(start_paused = true)]
async fn deadline_expires_between_attempts() {
    let faults = (0..10).map(|_| PutFault::Fail(StorageError::Timeout("slow".into())));
    let config = AllocatorConfig::builder()
        .backend_retries(10)
        .initial_backoff(Duration::from_secs(1))
        .max_backoff(Duration::from_secs(1))
        .build();
    let service = service(FaultyStore::with_put_faults(faults), &["aaaaaaa"], config);

    let err = service
        .allocate_within(TARGET, Metadata::new(), Duration::from_millis(2_500))
        .await
        .unwrap_err();

    assert!(matches!(err, AllocationError::Cancelled));
    assert!(service.store().put_calls() >= 2);
    assert!(service.store().inner().is_empty());
}

#[tokio::test]
async fn deadline_does_not_affect_fast_allocations() {
    let service = ShortenerService::new(InMemoryStore::new(), fast_config()).unwrap();

    let (short_code, _) = service
        .allocate_within(TARGET, Metadata::new(), Duration::from_secs(5))
        .await
        .unwrap();

    assert!(service.store().get(&short_code).await.unwrap().is_some());
}

#[tokio::test]
async fn custom_alphabet_and_length_are_respected() {
    let config = AllocatorConfig::builder()
        .alphabet(Alphabet::new("xyz").unwrap())
        .code_length(12)
        .build();
    let alphabet = config.alphabet.clone();
    let service = ShortenerService::new(InMemoryStore::new(), config).unwrap();

    for _ in 0..20 {
        let (short_code, _) = service.allocate(TARGET, Metadata::new()).await.unwrap();
        assert!(ShortCode::parse(short_code.as_str(), &alphabet, 12).is_ok());
    }
}

#[tokio::test]
async fn random_generator_is_the_default() {
    fn assert_default_generator(_: &ShortenerService<InMemoryStore, RandomGenerator>) {}

    let service = ShortenerService::new(InMemoryStore::new(), fast_config()).unwrap();
    assert_default_generator(&service);
}
