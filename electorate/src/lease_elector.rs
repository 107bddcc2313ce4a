//! The election engine.
//!
//! Every [`LeaseElector::tick`] reads the lease once and decides whether to
//! create it, take it over, renew it or follow its current holder. Conditional
//! writes carry the version that was read, so when several processes race only
//! one write lands and everybody else re-reads and follows the winner.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::{ConfigError, ElectionConfig};
use crate::dispatcher::{Dispatcher, Leadership};
use crate::elector::{Elector, ElectorError};
use crate::lease::{DateTime, LeaseKey, LeaseRecord, LeaseSpec};
use crate::listener::LeaderListener;
use crate::store::{LeaseStore, StoreError};

/// Result of a single election tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another tick was still running, nothing was done.
    Skipped,
    /// The lease did not exist and we created it.
    Created,
    /// The lease was unheld or expired and we took it over.
    Acquired,
    /// We held the lease and extended it.
    Renewed,
    /// Somebody else holds the lease.
    Following { holder: String },
    /// The tick failed or the holder could not be determined.
    Unknown,
}

impl TickOutcome {
    pub fn is_leading(&self) -> bool {
        matches!(
            self,
            TickOutcome::Created | TickOutcome::Acquired | TickOutcome::Renewed
        )
    }
}

/// Lease-based leader elector.
///
/// Holds this process's identity and its belief about leadership. Drive it by
/// calling [`tick`](Self::tick) periodically, for example with
/// [`ElectionDriver`](crate::ElectionDriver).
///
/// # Example
///
/// ```rust
/// use electorate::{ElectionConfig, InMemoryLeaseStore, LeaseElector, LoggingListener, TickOutcome};
///
/// # async fn example() -> Result<(), electorate::ConfigError> {
/// let store = InMemoryLeaseStore::new();
/// let elector = LeaseElector::new(store, ElectionConfig::new("demo-leader-lease"), LoggingListener)?;
///
/// assert_eq!(elector.tick().await, TickOutcome::Created);
/// assert!(elector.is_leader());
/// # Ok(())
/// # }
/// ```
pub struct LeaseElector<S> {
    store: S,
    key: LeaseKey,
    identity: String,
    lease_duration_seconds: u32,
    grace: chrono::Duration,
    config: ElectionConfig,
    dispatcher: Dispatcher,
    tick_in_flight: AtomicBool,
    // When the write behind our latest confirmed renewal was issued.
    renewed_at: Mutex<Option<Instant>>,
}

impl<S> LeaseElector<S>
where
    S: LeaseStore,
{
    /// Create an elector. Validates `config` and generates an identity if it has none.
    pub fn new<L>(store: S, config: ElectionConfig, listener: L) -> Result<Self, ConfigError>
    where
        L: LeaderListener + 'static,
    {
        config.validate()?;

        let identity = config
            .identity
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let key = config.key();

        info!(
            identity = %identity,
            lease = %key,
            lease_duration_seconds = config.lease_duration_seconds,
            renew_interval_seconds = config.renew_interval_seconds,
            grace_seconds = config.grace_seconds,
            "Leader elector created"
        );

        let listener: Arc<dyn LeaderListener> = Arc::new(listener);
        Ok(Self {
            store,
            key,
            lease_duration_seconds: config.lease_duration_seconds,
            grace: config.grace(),
            dispatcher: Dispatcher::new(identity.clone(), listener),
            identity,
            config,
            tick_in_flight: AtomicBool::new(false),
            renewed_at: Mutex::new(None),
        })
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn key(&self) -> &LeaseKey {
        &self.key
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    /// Whether this process is the leader right now.
    ///
    /// True only after a tick confirmed our hold on the lease, and only until
    /// the lease duration has elapsed since that confirmation. A stalled driver
    /// therefore cannot keep this process believing it leads past the point
    /// where others may take the lease over.
    pub fn is_leader(&self) -> bool {
        self.dispatcher.is_leader() && !self.lapsed()
    }

    /// Best-known holder of the lease as of the last tick.
    ///
    /// `None` once our own leadership has lapsed without renewal.
    pub fn current_leader(&self) -> Option<String> {
        if self.lapsed() {
            return None;
        }
        self.dispatcher.current_leader()
    }

    /// Snapshot of the local election state.
    ///
    /// A lapsed leadership reads as [`Leadership::Unknown`]. The listener
    /// hears about it at the start of the next tick.
    pub fn leadership(&self) -> Leadership {
        if self.lapsed() {
            return Leadership::Unknown;
        }
        self.dispatcher.leadership()
    }

    // Leading, but no confirmed write for a full lease duration.
    fn lapsed(&self) -> bool {
        if !self.dispatcher.is_leader() {
            return false;
        }
        let renewed_at = *self
            .renewed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let lease_duration =
            std::time::Duration::from_secs(u64::from(self.lease_duration_seconds));
        !renewed_at.is_some_and(|at| at.elapsed() < lease_duration)
    }

    /// Read the lease without taking part in the election.
    #[instrument(skip(self), fields(lease = %self.key))]
    pub async fn observe(&self) -> Result<Option<LeaseRecord>, StoreError> {
        let lease = self.store.get(&self.key).await?;
        match &lease {
            Some(lease) => info!(
                holder = lease.holder().unwrap_or("none"),
                renew_time = ?lease.spec.renew_time,
                "Lease found"
            ),
            None => info!("Lease not found yet"),
        }
        Ok(lease)
    }

    /// Run one election round.
    ///
    /// Never fails: store errors demote this process to an unknown follower and
    /// the next tick tries again. Returns [`TickOutcome::Skipped`] without
    /// touching the store if another tick is still running.
    #[instrument(skip(self), fields(identity = %self.identity, lease = %self.key))]
    pub async fn tick(&self) -> TickOutcome {
        let Some(_guard) = TickGuard::acquire(&self.tick_in_flight) else {
            debug!("Election already running, skipping");
            return TickOutcome::Skipped;
        };

        if self.lapsed() {
            warn!("Leadership lapsed without renewal");
            self.dispatcher.become_follower(None);
        }

        let started = Instant::now();
        let outcome = match self.elect(Utc::now()).await {
            Ok(outcome) => outcome,
            Err(error) => {
                warn!(error = %error, "Leader election error");
                TickOutcome::Unknown
            }
        };

        match &outcome {
            TickOutcome::Created | TickOutcome::Acquired | TickOutcome::Renewed => {
                *self
                    .renewed_at
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) = Some(started);
                self.dispatcher.become_leader();
            }
            TickOutcome::Following { holder } => self.dispatcher.become_follower(Some(holder)),
            TickOutcome::Unknown => self.dispatcher.become_follower(None),
            TickOutcome::Skipped => {}
        }

        outcome
    }

    /// Give up leadership locally, notifying the listener if we were leading.
    ///
    /// Best-effort: nothing is written to the store, the lease simply expires.
    /// A later tick may acquire it again. Returns `false` without changing
    /// anything while a tick is in flight, since that tick would overwrite the
    /// release when it completes.
    pub fn release(&self) -> bool {
        let Some(_guard) = TickGuard::acquire(&self.tick_in_flight) else {
            debug!("Election tick in flight, not releasing");
            return false;
        };
        if self.dispatcher.is_leader() {
            info!(identity = %self.identity, "Releasing leadership");
        }
        *self
            .renewed_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
        self.dispatcher.become_follower(None);
        true
    }

    async fn elect(&self, now: DateTime) -> Result<TickOutcome, StoreError> {
        let Some(lease) = self.store.get(&self.key).await? else {
            return self.create(now).await;
        };

        let expired = lease.is_expired(now, self.grace);
        debug!(
            holder = lease.holder(),
            renew_time = ?lease.spec.renew_time,
            lease_duration_seconds = lease.spec.lease_duration_seconds,
            expired,
            "Lease observed"
        );

        // Expiry is checked before ownership: a stale lease is taken over
        // with a fresh acquire time even if we were its holder.
        match lease.holder() {
            None => self.take_over(&lease, now).await,
            Some(_) if expired => self.take_over(&lease, now).await,
            Some(holder) if holder == self.identity => self.renew(&lease, now).await,
            Some(holder) => Ok(TickOutcome::Following {
                holder: holder.to_string(),
            }),
        }
    }

    async fn create(&self, now: DateTime) -> Result<TickOutcome, StoreError> {
        let spec = LeaseSpec::acquired_by(&self.identity, now, self.lease_duration_seconds);
        match self.store.create(&self.key, spec).await {
            Ok(_) => {
                info!("Lease created, leadership acquired");
                Ok(TickOutcome::Created)
            }
            Err(StoreError::AlreadyExists) => {
                info!("Lease created concurrently by another process");
                self.latest().await
            }
            Err(error) => Err(error),
        }
    }

    async fn take_over(&self, lease: &LeaseRecord, now: DateTime) -> Result<TickOutcome, StoreError> {
        let spec = LeaseSpec::acquired_by(&self.identity, now, self.lease_duration_seconds);
        match self
            .store
            .compare_and_swap(&self.key, spec, &lease.version)
            .await
        {
            Ok(_) => {
                info!(previous = lease.holder(), "Leadership acquired");
                Ok(TickOutcome::Acquired)
            }
            Err(StoreError::Conflict) => {
                info!("Takeover lost to another process (expected race)");
                self.latest().await
            }
            Err(StoreError::NotFound) => {
                info!("Lease deleted during takeover");
                Ok(TickOutcome::Unknown)
            }
            Err(error) => Err(error),
        }
    }

    async fn renew(&self, lease: &LeaseRecord, now: DateTime) -> Result<TickOutcome, StoreError> {
        let spec = lease.spec.renewed(now);
        match self
            .store
            .compare_and_swap(&self.key, spec, &lease.version)
            .await
        {
            Ok(_) => {
                debug!("Lease renewed");
                Ok(TickOutcome::Renewed)
            }
            Err(StoreError::Conflict) => {
                info!("Lease modified by another process during renewal");
                self.latest().await
            }
            Err(StoreError::NotFound) => {
                info!("Lease deleted during renewal");
                Ok(TickOutcome::Unknown)
            }
            Err(error) => Err(error),
        }
    }

    // Losing a race says nothing about who won, so ask the store.
    async fn latest(&self) -> Result<TickOutcome, StoreError> {
        let lease = self.store.get(&self.key).await?;
        Ok(match lease.as_ref().and_then(LeaseRecord::holder) {
            Some(holder) => TickOutcome::Following {
                holder: holder.to_string(),
            },
            None => TickOutcome::Unknown,
        })
    }
}

#[async_trait]
impl<S> Elector for LeaseElector<S>
where
    S: LeaseStore,
{
    async fn is_leader(&self) -> Result<bool, ElectorError> {
        Ok(LeaseElector::is_leader(self))
    }

    async fn release_leadership(&self) -> Result<(), ElectorError> {
        if !self.release() {
            warn!(identity = %self.identity, "Leadership not released, election tick in flight");
        }
        Ok(())
    }
}

/// Marks a tick as in flight for as long as it lives, including when the
/// tick future is dropped half-way.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}
