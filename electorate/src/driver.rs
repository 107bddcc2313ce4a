//! Background service that keeps an elector ticking.
//!
//! The driver calls [`LeaseElector::tick`] every renew interval. Ticks that
//! would pile up behind a slow store are skipped rather than queued, and on
//! shutdown the elector releases leadership locally so the listener hears
//! about it. The lease itself is left to expire.

use std::{future::Future, sync::Arc, time::Duration};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::lease_elector::{LeaseElector, TickOutcome};
use crate::store::LeaseStore;

/// Periodic driver for a [`LeaseElector`].
///
/// # Example
///
/// ```rust,no_run
/// use electorate::{ElectionConfig, ElectionDriver, InMemoryLeaseStore, LeaseElector, LoggingListener};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> anyhow::Result<()> {
/// let elector = LeaseElector::new(
///     InMemoryLeaseStore::new(),
///     ElectionConfig::new("demo-leader-lease"),
///     LoggingListener,
/// )?;
/// let elector = Arc::new(elector);
///
/// // Leader-only work reads `elector.is_leader()` from anywhere.
/// let driver = ElectionDriver::new(elector.clone());
///
/// // Run until the application cancels the token
/// let shutdown = CancellationToken::new();
/// tokio::spawn(async move { driver.run_until_cancelled(shutdown).await });
/// # Ok(())
/// # }
/// ```
pub struct ElectionDriver<S> {
    elector: Arc<LeaseElector<S>>,
    interval: Duration,
}

impl<S> ElectionDriver<S>
where
    S: LeaseStore + 'static,
{
    /// Drive `elector` at its configured renew interval.
    pub fn new(elector: Arc<LeaseElector<S>>) -> Self {
        let interval = elector.config().renew_interval();
        Self { elector, interval }
    }

    /// Override the tick interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn elector(&self) -> &Arc<LeaseElector<S>> {
        &self.elector
    }

    /// Run the driver. This method blocks forever.
    pub async fn run(&self) {
        self.run_with_shutdown(std::future::pending()).await
    }

    /// Run the driver until `token` is cancelled.
    pub async fn run_until_cancelled(&self, token: CancellationToken) {
        self.run_with_shutdown(token.cancelled_owned()).await
    }

    /// Run the driver until the shutdown future completes.
    ///
    /// # Arguments
    ///
    /// * `shutdown` - Future that completes when graceful shutdown should begin
    pub async fn run_with_shutdown<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        info!(
            identity = %self.elector.identity(),
            lease = %self.elector.key(),
            interval = ?self.interval,
            "Leader election driver starting"
        );

        // `interval` panics on a zero period.
        let mut interval = tokio::time::interval(self.interval.max(Duration::from_millis(1)));
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcome = self.elector.tick().await;
                    debug!(?outcome, leading = outcome.is_leading(), "Election tick finished");
                    if outcome == TickOutcome::Skipped {
                        debug!("Previous election tick still running");
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping leader election driver");
                    break;
                }
            }
        }

        self.elector.release();
        info!("Leader election driver stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ElectionConfig;
    use crate::memory::InMemoryLeaseStore;
    use crate::testing::RecordingListener;

    fn elector(
        store: InMemoryLeaseStore,
        identity: &str,
    ) -> (Arc<LeaseElector<InMemoryLeaseStore>>, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let config = ElectionConfig::new("driver-lease").with_identity(identity);
        let elector = LeaseElector::new(store, config, listener.clone()).unwrap();
        (Arc::new(elector), listener)
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_acquires_and_releases() {
        let store = InMemoryLeaseStore::new();
        let (elector, listener) = elector(store.clone(), "node-a");
        let driver = ElectionDriver::new(elector.clone());
        let token = CancellationToken::new();

        let handle = {
            let token = token.clone();
            tokio::spawn(async move { driver.run_until_cancelled(token).await })
        };

        // First interval tick fires immediately, then every 5 seconds.
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert!(elector.is_leader());
        assert_eq!(listener.started(), 1);

        token.cancel();
        handle.await.unwrap();

        assert!(!elector.is_leader());
        assert_eq!(listener.stopped(), 1);
        // Nothing is written on shutdown, the lease simply runs out.
        let record = store.snapshot(elector.key()).unwrap();
        assert_eq!(record.holder(), Some("node-a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_keeps_leader_renewed() {
        let store = InMemoryLeaseStore::new();
        let (elector, listener) = elector(store.clone(), "node-a");
        let driver = ElectionDriver::new(elector.clone());

        let first_renewal = {
            let shutdown = tokio::time::sleep(Duration::from_secs(1));
            driver.run_with_shutdown(shutdown).await;
            store.snapshot(elector.key()).unwrap().version
        };

        let shutdown = tokio::time::sleep(Duration::from_secs(60));
        driver.run_with_shutdown(shutdown).await;

        // Well past the lease duration, still renewed by the driver.
        let record = store.snapshot(elector.key()).unwrap();
        assert_ne!(record.version, first_renewal);
        assert_eq!(record.holder(), Some("node-a"));
        assert_eq!(listener.started(), 2);
        assert_eq!(listener.stopped(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_follower_driver_never_leads() {
        let store = InMemoryLeaseStore::new();
        let (leader, _) = elector(store.clone(), "node-a");
        let (follower, follower_listener) = elector(store.clone(), "node-b");
        assert!(leader.tick().await.is_leading());

        let leader_driver = ElectionDriver::new(leader.clone());
        let follower_driver = ElectionDriver::new(follower.clone());
        let token = CancellationToken::new();

        let handles = [
            tokio::spawn({
                let token = token.clone();
                async move { leader_driver.run_until_cancelled(token).await }
            }),
            tokio::spawn({
                let token = token.clone();
                async move { follower_driver.run_until_cancelled(token).await }
            }),
        ];

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(leader.is_leader());
        assert!(!follower.is_leader());
        assert_eq!(follower.current_leader().as_deref(), Some("node-a"));
        assert_eq!(follower_listener.started(), 0);
        assert_eq!(follower_listener.new_leaders(), vec!["node-a".to_string()]);

        token.cancel();
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(follower_listener.stopped(), 0);
    }
}
