//! The lease record shared by every process competing for leadership.
//!
//! A lease is identified by a [`LeaseKey`], carries a [`LeaseSpec`] with the
//! term-defining fields and is guarded by an opaque [`Version`] that the store
//! checks on every conditional write.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::expiry;

/// An alias for `chrono::DateTime<chrono::Utc>`
pub type DateTime = chrono::DateTime<Utc>;

/// Stable identifier of a lease. Immutable once the lease is created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeaseKey {
    pub namespace: String,
    pub name: String,
}

impl LeaseKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for LeaseKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Optimistic concurrency token.
///
/// Stores hand out a new version on every successful write. Callers never
/// inspect it, they only present the last one they observed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(String);

impl Version {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Generate a fresh, unique version token.
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The mutable part of a lease.
///
/// Every field may be absent: a record written by a foreign or broken client
/// is still readable, and missing timing fields make the lease count as
/// expired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseSpec {
    pub holder_identity: Option<String>,
    pub acquire_time: Option<DateTime>,
    pub renew_time: Option<DateTime>,
    pub lease_duration_seconds: Option<u32>,
}

impl LeaseSpec {
    /// Spec for a fresh term held by `identity`.
    pub fn acquired_by(identity: &str, now: DateTime, lease_duration_seconds: u32) -> Self {
        Self {
            holder_identity: Some(identity.to_string()),
            acquire_time: Some(now),
            renew_time: Some(now),
            lease_duration_seconds: Some(lease_duration_seconds),
        }
    }

    /// Same term, with only the renew time moved to `now`.
    pub fn renewed(&self, now: DateTime) -> Self {
        Self {
            renew_time: Some(now),
            ..self.clone()
        }
    }

    /// The holder, if any. Blank identities count as unheld.
    pub fn holder(&self) -> Option<&str> {
        self.holder_identity
            .as_deref()
            .filter(|holder| !holder.trim().is_empty())
    }

    pub fn is_held_by(&self, identity: &str) -> bool {
        self.holder() == Some(identity)
    }
}

/// A lease as observed in the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaseRecord {
    pub key: LeaseKey,
    pub spec: LeaseSpec,
    pub version: Version,
}

impl LeaseRecord {
    pub fn holder(&self) -> Option<&str> {
        self.spec.holder()
    }

    /// Whether this lease is stale at `now`, see [`expiry::is_expired`].
    pub fn is_expired(&self, now: DateTime, grace: chrono::Duration) -> bool {
        expiry::is_expired(
            self.spec.renew_time,
            self.spec.lease_duration_seconds,
            now,
            grace,
        )
    }
}
