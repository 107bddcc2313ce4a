use crate::types::{datetime_to_timestamp, LeaseRow};
use anyhow::Context;
use async_trait::async_trait;
use electorate::{LeaseKey, LeaseRecord, LeaseSpec, LeaseStore, StoreError, Version};
use sqlx::SqlitePool;
use tracing::instrument;

/// An implementation of the LeaseStore backed by SQLite
///
/// Every write replaces the `version` column with a fresh token, and
/// conditional writes only match the row if it still carries the version the
/// caller observed.
#[derive(Clone)]
pub struct SqliteLeaseStore {
    pub(crate) pool: SqlitePool,
}

impl SqliteLeaseStore {
    pub fn with_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn exists(&self, key: &LeaseKey) -> Result<bool, StoreError> {
        let exists: i64 = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM electorate_leases WHERE namespace = ?1 AND name = ?2)",
        )
        .bind(&key.namespace)
        .bind(&key.name)
        .fetch_one(&self.pool)
        .await
        .context("Failed to check lease existence")?;
        Ok(exists != 0)
    }
}

#[async_trait]
impl LeaseStore for SqliteLeaseStore {
    #[instrument(skip_all, err, fields(lease = %key))]
    async fn get(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, StoreError> {
        let row = sqlx::query_as::<_, LeaseRow>(
            "SELECT namespace, name, holder_identity, acquire_time, renew_time,
                    lease_duration_seconds, version
             FROM electorate_leases
             WHERE namespace = ?1 AND name = ?2",
        )
        .bind(&key.namespace)
        .bind(&key.name)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to read lease")?;

        let record = row.map(LeaseRow::into_record).transpose()?;
        Ok(record)
    }

    #[instrument(skip_all, fields(lease = %key))]
    async fn create(&self, key: &LeaseKey, spec: LeaseSpec) -> Result<Version, StoreError> {
        let version = Version::generate();

        let result = sqlx::query(
            "INSERT INTO electorate_leases (
                namespace, name, holder_identity, acquire_time, renew_time,
                lease_duration_seconds, version
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&key.namespace)
        .bind(&key.name)
        .bind(&spec.holder_identity)
        .bind(spec.acquire_time.map(datetime_to_timestamp))
        .bind(spec.renew_time.map(datetime_to_timestamp))
        .bind(spec.lease_duration_seconds.map(i64::from))
        .bind(version.as_str())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(version),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::AlreadyExists)
            }
            Err(e) => Err(anyhow::Error::new(e)
                .context("Failed to create lease")
                .into()),
        }
    }

    #[instrument(skip_all, fields(lease = %key, expected = %expected))]
    async fn compare_and_swap(
        &self,
        key: &LeaseKey,
        spec: LeaseSpec,
        expected: &Version,
    ) -> Result<Version, StoreError> {
        let version = Version::generate();

        let result = sqlx::query(
            "UPDATE electorate_leases
             SET holder_identity = ?1, acquire_time = ?2, renew_time = ?3,
                 lease_duration_seconds = ?4, version = ?5
             WHERE namespace = ?6 AND name = ?7 AND version = ?8",
        )
        .bind(&spec.holder_identity)
        .bind(spec.acquire_time.map(datetime_to_timestamp))
        .bind(spec.renew_time.map(datetime_to_timestamp))
        .bind(spec.lease_duration_seconds.map(i64::from))
        .bind(version.as_str())
        .bind(&key.namespace)
        .bind(&key.name)
        .bind(expected.as_str())
        .execute(&self.pool)
        .await
        .context("Failed to update lease")?;

        if result.rows_affected() > 0 {
            return Ok(version);
        }

        // Nothing matched: either the version moved on or the lease is gone.
        // The existence check runs outside the UPDATE, so a concurrent delete or
        // recreate can flip the answer. Callers treat both as a lost write.
        if self.exists(key).await? {
            Err(StoreError::Conflict)
        } else {
            Err(StoreError::NotFound)
        }
    }
}
