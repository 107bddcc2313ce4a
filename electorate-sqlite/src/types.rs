use anyhow::Context;
use electorate::{DateTime, LeaseKey, LeaseRecord, LeaseSpec, Version};
use sqlx::types::chrono::{TimeZone, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub(crate) struct LeaseRow {
    pub(crate) namespace: String,
    pub(crate) name: String,
    pub(crate) holder_identity: Option<String>,
    /// Unix timestamp in milliseconds
    pub(crate) acquire_time: Option<i64>,
    /// Unix timestamp in milliseconds
    pub(crate) renew_time: Option<i64>,
    pub(crate) lease_duration_seconds: Option<i64>,
    pub(crate) version: String,
}

impl LeaseRow {
    pub(crate) fn into_record(self) -> Result<LeaseRecord, anyhow::Error> {
        let lease_duration_seconds = self
            .lease_duration_seconds
            .map(u32::try_from)
            .transpose()
            .context("Invalid lease duration in database")?;

        Ok(LeaseRecord {
            key: LeaseKey::new(self.namespace, self.name),
            spec: LeaseSpec {
                holder_identity: self.holder_identity,
                acquire_time: self.acquire_time.map(timestamp_to_datetime).transpose()?,
                renew_time: self.renew_time.map(timestamp_to_datetime).transpose()?,
                lease_duration_seconds,
            },
            version: Version::new(self.version),
        })
    }
}

// Helper to convert SQLite INTEGER (Unix timestamp in milliseconds) to DateTime
pub(crate) fn timestamp_to_datetime(ts_ms: i64) -> Result<DateTime, anyhow::Error> {
    Utc.timestamp_millis_opt(ts_ms)
        .single()
        .with_context(|| format!("Invalid timestamp in database: {}", ts_ms))
}

// Helper to convert DateTime to SQLite INTEGER (Unix timestamp in milliseconds)
pub(crate) fn datetime_to_timestamp(dt: DateTime) -> i64 {
    dt.timestamp_millis()
}
