//! Turns tick results into edge-triggered listener notifications.
//!
//! The dispatcher owns the only authoritative copy of the local leadership
//! state. It is mutated exclusively from inside a tick (or the best-effort
//! release on shutdown) and read by everyone else as a snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info};

use crate::listener::LeaderListener;

/// What this process currently believes about leadership.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leadership {
    /// Nothing is known: no tick completed yet, or the last one failed.
    Unknown,
    /// Another holder was observed.
    Follower { holder: String },
    /// Our last write to the lease landed and has not been contradicted.
    Leader,
}

#[derive(Debug)]
struct State {
    leadership: Leadership,
    // Last identity passed to `on_new_leader`, for duplicate suppression.
    announced: Option<String>,
}

#[derive(Debug, PartialEq, Eq)]
enum Notification {
    StartLeading,
    StopLeading,
    NewLeader(String),
}

pub(crate) struct Dispatcher {
    identity: String,
    listener: Arc<dyn LeaderListener>,
    is_leader: AtomicBool,
    state: Mutex<State>,
}

impl Dispatcher {
    pub(crate) fn new(identity: String, listener: Arc<dyn LeaderListener>) -> Self {
        Self {
            identity,
            listener,
            is_leader: AtomicBool::new(false),
            state: Mutex::new(State {
                leadership: Leadership::Unknown,
                announced: None,
            }),
        }
    }

    pub(crate) fn is_leader(&self) -> bool {
        self.is_leader.load(Ordering::SeqCst)
    }

    pub(crate) fn leadership(&self) -> Leadership {
        self.state().leadership.clone()
    }

    pub(crate) fn current_leader(&self) -> Option<String> {
        match &self.state().leadership {
            Leadership::Unknown => None,
            Leadership::Follower { holder } => Some(holder.clone()),
            Leadership::Leader => Some(self.identity.clone()),
        }
    }

    /// Our write to the lease landed.
    pub(crate) fn become_leader(&self) {
        let notifications = {
            let mut state = self.state();
            let mut notifications = Vec::new();
            if state.leadership != Leadership::Leader {
                info!(identity = %self.identity, "Became leader");
                state.leadership = Leadership::Leader;
                // Any foreign holder seen after this is news again.
                state.announced = None;
                self.is_leader.store(true, Ordering::SeqCst);
                notifications.push(Notification::StartLeading);
            }
            notifications
        };
        self.notify(notifications);
    }

    /// We are not the leader. `holder` is the best-known holder, `None` if unknown.
    pub(crate) fn become_follower(&self, holder: Option<&str>) {
        let notifications = {
            let mut state = self.state();
            let mut notifications = Vec::new();

            if state.leadership == Leadership::Leader {
                info!(identity = %self.identity, "Leadership lost");
                self.is_leader.store(false, Ordering::SeqCst);
                notifications.push(Notification::StopLeading);
            }

            let next = match holder {
                Some(holder) => Leadership::Follower {
                    holder: holder.to_string(),
                },
                None => Leadership::Unknown,
            };
            if state.leadership != next {
                match holder {
                    Some(holder) => info!(leader = holder, "Current leader changed"),
                    None => info!("Leader unknown"),
                }
                state.leadership = next;
            }

            if let Some(holder) = holder.filter(|holder| *holder != self.identity) {
                if state.announced.as_deref() != Some(holder) {
                    state.announced = Some(holder.to_string());
                    notifications.push(Notification::NewLeader(holder.to_string()));
                }
            }
            notifications
        };
        self.notify(notifications);
    }

    // Callbacks run outside the lock so listeners may read the state back.
    fn notify(&self, notifications: Vec<Notification>) {
        for notification in notifications {
            debug!(?notification, "Dispatching leadership notification");
            match notification {
                Notification::StartLeading => self.listener.on_start_leading(),
                Notification::StopLeading => self.listener.on_stop_leading(),
                Notification::NewLeader(identity) => self.listener.on_new_leader(&identity),
            }
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingListener;

    fn dispatcher() -> (Dispatcher, Arc<RecordingListener>) {
        let listener = Arc::new(RecordingListener::default());
        let dispatcher = Dispatcher::new("self".to_string(), listener.clone());
        (dispatcher, listener)
    }

    #[test]
    fn test_initial_state_is_unknown() {
        let (dispatcher, listener) = dispatcher();

        assert!(!dispatcher.is_leader());
        assert_eq!(dispatcher.leadership(), Leadership::Unknown);
        assert_eq!(dispatcher.current_leader(), None);
        assert_eq!(listener.started(), 0);
        assert_eq!(listener.stopped(), 0);
    }

    #[test]
    fn test_start_leading_fires_once() {
        let (dispatcher, listener) = dispatcher();

        dispatcher.become_leader();
        dispatcher.become_leader();
        dispatcher.become_leader();

        assert!(dispatcher.is_leader());
        assert_eq!(dispatcher.current_leader().as_deref(), Some("self"));
        assert_eq!(listener.started(), 1);
        assert_eq!(listener.stopped(), 0);
        assert!(listener.new_leaders().is_empty());
    }

    #[test]
    fn test_stop_leading_fires_once() {
        let (dispatcher, listener) = dispatcher();

        dispatcher.become_leader();
        dispatcher.become_follower(Some("other"));
        dispatcher.become_follower(Some("other"));

        assert!(!dispatcher.is_leader());
        assert_eq!(listener.started(), 1);
        assert_eq!(listener.stopped(), 1);
        assert_eq!(listener.new_leaders(), vec!["other".to_string()]);
    }

    #[test]
    fn test_follower_of_unchanged_holder_is_silent() {
        let (dispatcher, listener) = dispatcher();

        for _ in 0..5 {
            dispatcher.become_follower(Some("other"));
        }

        assert_eq!(
            dispatcher.leadership(),
            Leadership::Follower {
                holder: "other".to_string()
            }
        );
        assert_eq!(listener.new_leaders(), vec!["other".to_string()]);
        assert_eq!(listener.stopped(), 0);
    }

    #[test]
    fn test_holder_change_is_announced() {
        let (dispatcher, listener) = dispatcher();

        dispatcher.become_follower(Some("a"));
        dispatcher.become_follower(Some("b"));
        dispatcher.become_follower(Some("a"));

        assert_eq!(
            listener.new_leaders(),
            vec!["a".to_string(), "b".to_string(), "a".to_string()]
        );
    }

    #[test]
    fn test_unknown_gap_does_not_repeat_announcement() {
        let (dispatcher, listener) = dispatcher();

        dispatcher.become_follower(Some("a"));
        dispatcher.become_follower(None);
        assert_eq!(dispatcher.leadership(), Leadership::Unknown);
        dispatcher.become_follower(Some("a"));

        assert_eq!(listener.new_leaders(), vec!["a".to_string()]);
    }

    #[test]
    fn test_same_holder_announced_again_after_own_term() {
        let (dispatcher, listener) = dispatcher();

        dispatcher.become_follower(Some("a"));
        dispatcher.become_leader();
        dispatcher.become_follower(Some("a"));

        assert_eq!(listener.new_leaders(), vec!["a".to_string(), "a".to_string()]);
        assert_eq!(listener.started(), 1);
        assert_eq!(listener.stopped(), 1);
    }

    #[test]
    fn test_demotion_to_unknown() {
        let (dispatcher, listener) = dispatcher();

        dispatcher.become_leader();
        dispatcher.become_follower(None);

        assert!(!dispatcher.is_leader());
        assert_eq!(dispatcher.leadership(), Leadership::Unknown);
        assert_eq!(dispatcher.current_leader(), None);
        assert_eq!(listener.stopped(), 1);
        assert!(listener.new_leaders().is_empty());
    }

    #[test]
    fn test_own_identity_as_follower_is_not_announced() {
        let (dispatcher, listener) = dispatcher();

        dispatcher.become_follower(Some("self"));

        assert!(!dispatcher.is_leader());
        assert_eq!(dispatcher.current_leader().as_deref(), Some("self"));
        assert!(listener.new_leaders().is_empty());
    }

    #[test]
    fn test_listener_can_read_state_during_callback() {
        struct Reentrant(std::sync::OnceLock<Arc<Dispatcher>>);

        impl LeaderListener for Reentrant {
            fn on_start_leading(&self) {
                let dispatcher = self.0.get().unwrap();
                assert!(dispatcher.is_leader());
                assert_eq!(dispatcher.leadership(), Leadership::Leader);
            }

            fn on_stop_leading(&self) {
                assert!(!self.0.get().unwrap().is_leader());
            }
        }

        let listener = Arc::new(Reentrant(std::sync::OnceLock::new()));
        let dispatcher = Arc::new(Dispatcher::new("self".to_string(), listener.clone()));
        listener.0.set(dispatcher.clone()).ok().unwrap();

        dispatcher.become_leader();
        dispatcher.become_follower(None);
    }
}
