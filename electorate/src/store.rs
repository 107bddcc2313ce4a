use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::lease::{LeaseKey, LeaseRecord, LeaseSpec, Version};

/// An interface to the strongly-consistent store that holds lease records.
///
/// Implementations must provide linearizable compare-and-swap on a single
/// record: a conditional write lands only if the stored version still equals
/// the version presented by the writer. Mutual exclusion between electors
/// rests entirely on that guarantee.
#[async_trait]
pub trait LeaseStore: Send + Sync {
    /// Read the lease. Returns `None` if it does not exist yet.
    async fn get(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, StoreError>;

    /// Create the lease.
    ///
    /// Fails with [`StoreError::AlreadyExists`] if another process created it first.
    async fn create(&self, key: &LeaseKey, spec: LeaseSpec) -> Result<Version, StoreError>;

    /// Replace the lease if its stored version still equals `expected`.
    ///
    /// Returns the new version on success, [`StoreError::Conflict`] if the
    /// record was modified since `expected` was observed, and
    /// [`StoreError::NotFound`] if it no longer exists.
    async fn compare_and_swap(
        &self,
        key: &LeaseKey,
        spec: LeaseSpec,
        expected: &Version,
    ) -> Result<Version, StoreError>;
}

#[async_trait]
impl<S> LeaseStore for Arc<S>
where
    S: LeaseStore + ?Sized,
{
    async fn get(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, StoreError> {
        (**self).get(key).await
    }

    async fn create(&self, key: &LeaseKey, spec: LeaseSpec) -> Result<Version, StoreError> {
        (**self).create(key, spec).await
    }

    async fn compare_and_swap(
        &self,
        key: &LeaseKey,
        spec: LeaseSpec,
        expected: &Version,
    ) -> Result<Version, StoreError> {
        (**self).compare_and_swap(key, spec, expected).await
    }
}

/// Errors related to lease store operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    /// The lease does not exist.
    #[error("Lease not found")]
    NotFound,

    /// The lease was created by someone else first.
    #[error("Lease already exists")]
    AlreadyExists,

    /// The stored version no longer matches the one presented by the writer.
    #[error("Lease version conflict")]
    Conflict,

    /// Transport, authentication, timeout or any other backend failure.
    #[error("Store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    /// Whether the error is an expected outcome of racing electors rather
    /// than a failure of the store.
    pub fn is_race(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound | StoreError::AlreadyExists | StoreError::Conflict
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_race_errors() {
        assert!(StoreError::Conflict.is_race());
        assert!(StoreError::AlreadyExists.is_race());
        assert!(StoreError::NotFound.is_race());
        assert!(!StoreError::Backend(anyhow::anyhow!("connection reset")).is_race());
    }

    #[test]
    fn test_backend_error_message() {
        let err = StoreError::from(anyhow::anyhow!("timed out"));
        assert_eq!(err.to_string(), "Store backend error: timed out");
    }
}
