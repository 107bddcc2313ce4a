use async_trait::async_trait;
use thiserror::Error;

use crate::store::StoreError;

/// Read-side view of leader election.
///
/// Leader-only work depends on this trait rather than on a concrete elector,
/// so it can be gated on any election mechanism (or on a test double).
#[async_trait]
pub trait Elector: Send + Sync {
    /// Check if this instance is currently the leader.
    ///
    /// This method should be lightweight and idempotent, as it may be called frequently.
    /// The answer is a snapshot: it may change at the next election tick.
    ///
    /// # Returns
    /// - `Ok(true)` if this instance is the leader
    /// - `Ok(false)` if another instance is the leader, or the leader is unknown
    /// - `Err` if leadership status cannot be determined
    async fn is_leader(&self) -> Result<bool, ElectorError>;

    /// Optional: Release leadership explicitly (for graceful shutdown).
    /// Default implementation is a no-op.
    async fn release_leadership(&self) -> Result<(), ElectorError> {
        Ok(())
    }
}

/// Errors that can occur during leader election
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ElectorError {
    #[error("Lease store error during leader election: {0}")]
    StoreError(#[from] StoreError),

    #[error(transparent)]
    Other(#[from] Box<dyn std::error::Error + Send + Sync>),
}
