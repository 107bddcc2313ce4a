//! Lease-based leader election for distributed systems.
//!
//! A set of equivalent processes elect a single leader by competing for one
//! versioned lease record in a shared, strongly-consistent store. The store's
//! compare-and-swap is the only coordination primitive: processes never talk
//! to each other.
//!
//! - [`LeaseElector`] runs the election, one [`tick`](LeaseElector::tick) at a time.
//! - [`ElectionDriver`] ticks it periodically on a tokio runtime.
//! - [`LeaderListener`] is notified when leadership is gained, lost, or moves elsewhere.
//! - [`LeaseStore`] is the store capability; [`InMemoryLeaseStore`] is a
//!   process-local implementation, `electorate-sqlite` provides a SQL-backed one.
//!
//! # Examples
//!
//! ## Two processes, one lease
//!
//! ```rust
//! use electorate::{ElectionConfig, InMemoryLeaseStore, LeaseElector, LoggingListener, TickOutcome};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let store = InMemoryLeaseStore::new();
//! let config = ElectionConfig::new("order-processor-leader");
//!
//! let first = LeaseElector::new(store.clone(), config.clone(), LoggingListener)?;
//! let second = LeaseElector::new(store, config, LoggingListener)?;
//!
//! assert_eq!(first.tick().await, TickOutcome::Created);
//! assert!(matches!(second.tick().await, TickOutcome::Following { .. }));
//!
//! assert!(first.is_leader());
//! assert!(!second.is_leader());
//! assert_eq!(second.current_leader().as_deref(), Some(first.identity()));
//! # Ok(())
//! # }
//! ```
//!
//! ## Gating leader-only work
//!
//! ```rust
//! use electorate::Elector;
//!
//! async fn run_batch(elector: &dyn Elector) -> anyhow::Result<()> {
//!     if !elector.is_leader().await? {
//!         tracing::info!("Skipping execution, not leader");
//!         return Ok(());
//!     }
//!     // ... leader-only work
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod driver;
pub mod elector;
pub mod expiry;
pub mod lease;
pub mod lease_elector;
pub mod listener;
pub mod memory;
pub mod store;

mod dispatcher;

#[cfg(test)]
mod testing;

/// Shared test specifications for store implementations.
///
/// Backend tests call these through [`generate_store_spec_tests!`].
#[doc(hidden)]
pub mod store_spec;

#[doc(hidden)]
pub use paste;

// Re-export main types
pub use config::{ConfigError, ElectionConfig};
pub use dispatcher::Leadership;
pub use driver::ElectionDriver;
pub use elector::{Elector, ElectorError};
pub use lease::{DateTime, LeaseKey, LeaseRecord, LeaseSpec, Version};
pub use lease_elector::{LeaseElector, TickOutcome};
pub use listener::{LeaderListener, LoggingListener};
pub use memory::InMemoryLeaseStore;
pub use store::{LeaseStore, StoreError};

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust
/// use electorate::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::ElectionConfig;
    pub use crate::driver::ElectionDriver;
    pub use crate::elector::{Elector, ElectorError};
    pub use crate::lease_elector::{LeaseElector, TickOutcome};
    pub use crate::listener::LeaderListener;
    pub use crate::store::{LeaseStore, StoreError};
}
