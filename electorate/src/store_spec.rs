//! Shared test specifications for LeaseStore implementations.
//!
//! These test functions can be called by any backend (in-memory, SQLite, etc.)
//! to ensure every store honours the same compare-and-swap contract.

/// Generate all store spec test wrappers for a backend.
///
/// # Usage
///
/// ```ignore
/// electorate::generate_store_spec_tests! {
///     backend = "sqlite",
///     test_attr = tokio::test,
///     setup = || {
///         let pool = make_pool().await;
///         SqliteLeaseStore::with_pool(pool)
///     }
/// }
/// ```
#[macro_export]
macro_rules! generate_store_spec_tests {
    (
        backend = $backend:literal,
        test_attr = $test_attr:meta,
        setup = || $setup_expr:expr
    ) => {
        $crate::paste::paste! {
            #[$test_attr]
            async fn [<get_missing_lease_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_get_missing_lease(store).await;
            }

            #[$test_attr]
            async fn [<create_then_get_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_create_then_get(store).await;
            }

            #[$test_attr]
            async fn [<create_existing_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_create_existing(store).await;
            }

            #[$test_attr]
            async fn [<empty_spec_roundtrip_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_empty_spec_roundtrip(store).await;
            }

            #[$test_attr]
            async fn [<cas_current_version_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_cas_current_version(store).await;
            }

            #[$test_attr]
            async fn [<cas_stale_version_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_cas_stale_version(store).await;
            }

            #[$test_attr]
            async fn [<cas_missing_lease_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_cas_missing_lease(store).await;
            }

            #[$test_attr]
            async fn [<cas_concurrent_single_winner_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_cas_concurrent_single_winner(store).await;
            }

            #[$test_attr]
            async fn [<create_concurrent_single_winner_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_create_concurrent_single_winner(store).await;
            }

            #[$test_attr]
            async fn [<keys_are_independent_ $backend>]() {
                let store = $setup_expr;
                $crate::store_spec::test_keys_are_independent(store).await;
            }
        }
    };
}

use crate::lease::{DateTime, LeaseKey, LeaseSpec};
use crate::store::{LeaseStore, StoreError};
use chrono::{TimeZone, Utc};
use futures::future::join_all;

// Millisecond precision so every backend can store it losslessly.
fn now_millis() -> DateTime {
    Utc.timestamp_millis_opt(Utc::now().timestamp_millis())
        .single()
        .unwrap()
}

fn test_key(name: &str) -> LeaseKey {
    LeaseKey::new("store-spec", name)
}

/// Reading a lease that was never created returns `None`, not an error.
pub async fn test_get_missing_lease<S: LeaseStore>(store: S) {
    let record = store.get(&test_key("missing")).await.unwrap();
    assert!(record.is_none());
}

/// A created lease reads back with the same spec and version.
pub async fn test_create_then_get<S: LeaseStore>(store: S) {
    let key = test_key("create-then-get");
    let now = now_millis();
    let spec = LeaseSpec::acquired_by("node-a", now, 15);

    let version = store.create(&key, spec.clone()).await.unwrap();
    let record = store.get(&key).await.unwrap().unwrap();

    assert_eq!(record.key, key);
    assert_eq!(record.spec, spec);
    assert_eq!(record.version, version);
}

/// A second create fails with `AlreadyExists` and leaves the first record intact.
pub async fn test_create_existing<S: LeaseStore>(store: S) {
    let key = test_key("create-existing");
    let now = now_millis();

    let version = store
        .create(&key, LeaseSpec::acquired_by("node-a", now, 15))
        .await
        .unwrap();
    let err = store
        .create(&key, LeaseSpec::acquired_by("node-b", now, 15))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists), "got {err:?}");

    let record = store.get(&key).await.unwrap().unwrap();
    assert_eq!(record.holder(), Some("node-a"));
    assert_eq!(record.version, version);
}

/// A spec with every field absent is stored and read back as such.
pub async fn test_empty_spec_roundtrip<S: LeaseStore>(store: S) {
    let key = test_key("empty-spec");

    store.create(&key, LeaseSpec::default()).await.unwrap();
    let record = store.get(&key).await.unwrap().unwrap();

    assert_eq!(record.spec, LeaseSpec::default());
    assert_eq!(record.holder(), None);
}

/// A write presenting the current version lands and produces a new version.
pub async fn test_cas_current_version<S: LeaseStore>(store: S) {
    let key = test_key("cas-current");
    let now = now_millis();
    let spec = LeaseSpec::acquired_by("node-a", now, 15);
    let version = store.create(&key, spec.clone()).await.unwrap();

    let renewed = spec.renewed(now_millis());
    let new_version = store
        .compare_and_swap(&key, renewed.clone(), &version)
        .await
        .unwrap();
    assert_ne!(new_version, version);

    let record = store.get(&key).await.unwrap().unwrap();
    assert_eq!(record.spec, renewed);
    assert_eq!(record.version, new_version);
}

/// A write presenting an old version is rejected and changes nothing.
pub async fn test_cas_stale_version<S: LeaseStore>(store: S) {
    let key = test_key("cas-stale");
    let now = now_millis();
    let stale = store
        .create(&key, LeaseSpec::acquired_by("node-a", now, 15))
        .await
        .unwrap();
    let current = store
        .compare_and_swap(&key, LeaseSpec::acquired_by("node-b", now, 15), &stale)
        .await
        .unwrap();

    let err = store
        .compare_and_swap(&key, LeaseSpec::acquired_by("node-c", now, 15), &stale)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict), "got {err:?}");

    let record = store.get(&key).await.unwrap().unwrap();
    assert_eq!(record.holder(), Some("node-b"));
    assert_eq!(record.version, current);
}

/// A conditional write against a lease that does not exist is `NotFound`.
pub async fn test_cas_missing_lease<S: LeaseStore>(store: S) {
    let key = test_key("cas-missing");
    let version = crate::lease::Version::generate();

    let err = store
        .compare_and_swap(&key, LeaseSpec::default(), &version)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound), "got {err:?}");
    assert!(store.get(&key).await.unwrap().is_none());
}

/// Many writers presenting the same version: exactly one wins.
pub async fn test_cas_concurrent_single_winner<S: LeaseStore>(store: S) {
    let key = test_key("cas-race");
    let now = now_millis();
    let version = store.create(&key, LeaseSpec::default()).await.unwrap();

    let identities: Vec<String> = (0..8).map(|i| format!("node-{i}")).collect();
    let results = join_all(identities.iter().map(|identity| {
        store.compare_and_swap(&key, LeaseSpec::acquired_by(identity, now, 15), &version)
    }))
    .await;

    let winners: Vec<&String> = identities
        .iter()
        .zip(&results)
        .filter(|(_, result)| result.is_ok())
        .map(|(identity, _)| identity)
        .collect();
    assert_eq!(winners.len(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, StoreError::Conflict)));

    let record = store.get(&key).await.unwrap().unwrap();
    assert_eq!(record.holder(), Some(winners[0].as_str()));
}

/// Many creators racing on an absent lease: exactly one wins.
pub async fn test_create_concurrent_single_winner<S: LeaseStore>(store: S) {
    let key = test_key("create-race");
    let now = now_millis();

    let identities: Vec<String> = (0..8).map(|i| format!("node-{i}")).collect();
    let results = join_all(
        identities
            .iter()
            .map(|identity| store.create(&key, LeaseSpec::acquired_by(identity, now, 15))),
    )
    .await;

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|result| result.as_ref().err())
        .all(|err| matches!(err, StoreError::AlreadyExists)));
}

/// Leases with the same name in different namespaces do not interfere.
pub async fn test_keys_are_independent<S: LeaseStore>(store: S) {
    let now = now_millis();
    let first = LeaseKey::new("team-a", "scheduler");
    let second = LeaseKey::new("team-b", "scheduler");

    let first_version = store
        .create(&first, LeaseSpec::acquired_by("node-a", now, 15))
        .await
        .unwrap();
    store
        .create(&second, LeaseSpec::acquired_by("node-b", now, 15))
        .await
        .unwrap();

    let err = store
        .compare_and_swap(&second, LeaseSpec::default(), &first_version)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict), "got {err:?}");

    assert_eq!(
        store.get(&first).await.unwrap().unwrap().holder(),
        Some("node-a")
    );
    assert_eq!(
        store.get(&second).await.unwrap().unwrap().holder(),
        Some("node-b")
    );
}
