//! Process-local lease store.
//!
//! Useful for tests and for running several electors inside one process. All
//! operations go through a single mutex, which makes compare-and-swap
//! linearizable.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::instrument;

use crate::lease::{LeaseKey, LeaseRecord, LeaseSpec, Version};
use crate::store::{LeaseStore, StoreError};

/// A [`LeaseStore`] kept in memory. Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLeaseStore {
    leases: Arc<Mutex<HashMap<LeaseKey, LeaseRecord>>>,
}

impl InMemoryLeaseStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `spec` unconditionally, creating or replacing the lease.
    pub fn put(&self, key: &LeaseKey, spec: LeaseSpec) -> Version {
        let version = Version::generate();
        self.leases().insert(
            key.clone(),
            LeaseRecord {
                key: key.clone(),
                spec,
                version: version.clone(),
            },
        );
        version
    }

    /// Current record, bypassing the async interface.
    pub fn snapshot(&self, key: &LeaseKey) -> Option<LeaseRecord> {
        self.leases().get(key).cloned()
    }

    pub fn remove(&self, key: &LeaseKey) -> Option<LeaseRecord> {
        self.leases().remove(key)
    }

    fn leases(&self) -> MutexGuard<'_, HashMap<LeaseKey, LeaseRecord>> {
        // Nothing panics mid-update, so a poisoned map is still consistent.
        self.leases.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LeaseStore for InMemoryLeaseStore {
    #[instrument(skip_all, fields(lease = %key))]
    async fn get(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, StoreError> {
        Ok(self.snapshot(key))
    }

    #[instrument(skip_all, fields(lease = %key))]
    async fn create(&self, key: &LeaseKey, spec: LeaseSpec) -> Result<Version, StoreError> {
        let mut leases = self.leases();
        if leases.contains_key(key) {
            return Err(StoreError::AlreadyExists);
        }

        let version = Version::generate();
        leases.insert(
            key.clone(),
            LeaseRecord {
                key: key.clone(),
                spec,
                version: version.clone(),
            },
        );
        Ok(version)
    }

    #[instrument(skip_all, fields(lease = %key, expected = %expected))]
    async fn compare_and_swap(
        &self,
        key: &LeaseKey,
        spec: LeaseSpec,
        expected: &Version,
    ) -> Result<Version, StoreError> {
        let mut leases = self.leases();
        let record = leases.get_mut(key).ok_or(StoreError::NotFound)?;
        if &record.version != expected {
            return Err(StoreError::Conflict);
        }

        let version = Version::generate();
        record.spec = spec;
        record.version = version.clone();
        Ok(version)
    }
}
