use tracing::info;

/// Callbacks fired on leadership transitions.
///
/// Notifications are edge-triggered: `on_start_leading` fires once when this
/// process becomes leader, not on every renewal, and `on_stop_leading` fires
/// once when it stops. `on_new_leader` fires once per distinct foreign holder
/// observed.
///
/// Callbacks run on the elector's tick and should return quickly. Spawn a task
/// for anything long-running.
///
/// # Example
/// ```rust
/// use electorate::LeaderListener;
/// use std::sync::atomic::{AtomicBool, Ordering};
///
/// #[derive(Default)]
/// struct Jobs {
///     running: AtomicBool,
/// }
///
/// impl LeaderListener for Jobs {
///     fn on_start_leading(&self) {
///         self.running.store(true, Ordering::SeqCst);
///     }
///
///     fn on_stop_leading(&self) {
///         self.running.store(false, Ordering::SeqCst);
///     }
/// }
/// ```
pub trait LeaderListener: Send + Sync {
    /// This process just became leader.
    fn on_start_leading(&self);

    /// This process just stopped being leader.
    fn on_stop_leading(&self);

    /// Another process was observed holding the lease.
    /// Default implementation is a no-op.
    fn on_new_leader(&self, identity: &str) {
        let _ = identity;
    }
}

/// A listener that only logs transitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingListener;

impl LeaderListener for LoggingListener {
    fn on_start_leading(&self) {
        info!("Became leader");
    }

    fn on_stop_leading(&self) {
        info!("Leadership lost");
    }

    fn on_new_leader(&self, identity: &str) {
        info!(leader = identity, "New leader elected");
    }
}

impl<L> LeaderListener for std::sync::Arc<L>
where
    L: LeaderListener + ?Sized,
{
    fn on_start_leading(&self) {
        (**self).on_start_leading()
    }

    fn on_stop_leading(&self) {
        (**self).on_stop_leading()
    }

    fn on_new_leader(&self, identity: &str) {
        (**self).on_new_leader(identity)
    }
}
