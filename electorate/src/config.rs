//! Elector configuration.
//!
//! Configuration is plain data: load it with whatever the host application
//! uses (a config file, environment, command-line flags) through `serde`, or
//! build it in code. It is validated once when the elector is constructed,
//! before any tick runs.
//!
//! # Examples
//!
//! ```rust
//! use electorate::ElectionConfig;
//!
//! let config = ElectionConfig::new("order-processor-leader")
//!     .in_namespace("payments")
//!     .with_lease_duration(30)
//!     .with_renew_interval(10);
//!
//! assert!(config.validate().is_ok());
//! assert_eq!(config.key().to_string(), "payments/order-processor-leader");
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::lease::LeaseKey;

pub const DEFAULT_NAMESPACE: &str = "default";
pub const DEFAULT_LEASE_DURATION_SECONDS: u32 = 15;
pub const DEFAULT_RENEW_INTERVAL_SECONDS: u32 = 5;
pub const DEFAULT_GRACE_SECONDS: u32 = 2;

/// Options for configuring a [`LeaseElector`](crate::LeaseElector).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
#[non_exhaustive]
pub struct ElectionConfig {
    /// Namespace of the lease (default: "default")
    pub namespace: String,

    /// Name of the lease. Required.
    #[serde(alias = "lease-name")]
    pub name: String,

    /// Time-to-live advertised by the holder (default: 15 seconds)
    pub lease_duration_seconds: u32,

    /// How often the driver ticks (default: 5 seconds).
    /// Must be shorter than the lease duration.
    pub renew_interval_seconds: u32,

    /// Extra time past the lease duration before a lease counts as expired (default: 2 seconds)
    pub grace_seconds: u32,

    /// Identity of this process. A random one is generated when absent.
    pub identity: Option<String>,
}

impl Default for ElectionConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            name: String::new(),
            lease_duration_seconds: DEFAULT_LEASE_DURATION_SECONDS,
            renew_interval_seconds: DEFAULT_RENEW_INTERVAL_SECONDS,
            grace_seconds: DEFAULT_GRACE_SECONDS,
            identity: None,
        }
    }
}

impl ElectionConfig {
    /// Configuration for the lease `name` in the default namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn in_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn with_lease_duration(mut self, seconds: u32) -> Self {
        self.lease_duration_seconds = seconds;
        self
    }

    pub fn with_renew_interval(mut self, seconds: u32) -> Self {
        self.renew_interval_seconds = seconds;
        self
    }

    pub fn with_grace(mut self, seconds: u32) -> Self {
        self.grace_seconds = seconds;
        self
    }

    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn key(&self) -> LeaseKey {
        LeaseKey::new(&self.namespace, &self.name)
    }

    pub fn renew_interval(&self) -> Duration {
        Duration::from_secs(u64::from(self.renew_interval_seconds))
    }

    pub fn grace(&self) -> chrono::Duration {
        chrono::Duration::seconds(i64::from(self.grace_seconds))
    }

    /// Check the configuration for values the elector cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() {
            return Err(ConfigError::MissingNamespace);
        }
        if self.name.trim().is_empty() {
            return Err(ConfigError::MissingLeaseName);
        }
        if self.lease_duration_seconds == 0 {
            return Err(ConfigError::ZeroLeaseDuration);
        }
        if self.renew_interval_seconds == 0 {
            return Err(ConfigError::ZeroRenewInterval);
        }
        if self.renew_interval_seconds >= self.lease_duration_seconds {
            return Err(ConfigError::RenewIntervalTooLong {
                renew_interval_seconds: self.renew_interval_seconds,
                lease_duration_seconds: self.lease_duration_seconds,
            });
        }
        if let Some(identity) = &self.identity {
            validate_identity(identity)?;
        }
        Ok(())
    }
}

fn validate_identity(identity: &str) -> Result<(), ConfigError> {
    if identity.trim().is_empty() || identity.chars().any(char::is_control) {
        return Err(ConfigError::InvalidIdentity(identity.to_string()));
    }
    Ok(())
}

/// Errors in elector configuration. Reported at construction, never by a tick.
#[derive(Error, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("Lease namespace must not be empty")]
    MissingNamespace,

    #[error("Lease name must not be empty")]
    MissingLeaseName,

    #[error("Lease duration must be at least one second")]
    ZeroLeaseDuration,

    #[error("Renew interval must be at least one second")]
    ZeroRenewInterval,

    #[error("Renew interval of {renew_interval_seconds}s must be shorter than the lease duration of {lease_duration_seconds}s")]
    RenewIntervalTooLong {
        renew_interval_seconds: u32,
        lease_duration_seconds: u32,
    },

    #[error("Invalid identity {0:?}: must be non-blank and free of control characters")]
    InvalidIdentity(String),
}
