//! Test doubles shared by the unit tests of this crate.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::lease::{LeaseKey, LeaseRecord, LeaseSpec, Version};
use crate::listener::LeaderListener;
use crate::memory::InMemoryLeaseStore;
use crate::store::{LeaseStore, StoreError};

#[allow(dead_code)]
pub(crate) fn setup_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

/// Counts every callback it receives.
#[derive(Debug, Default)]
pub(crate) struct RecordingListener {
    started: AtomicUsize,
    stopped: AtomicUsize,
    new_leaders: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub(crate) fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn stopped(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }

    pub(crate) fn new_leaders(&self) -> Vec<String> {
        self.new_leaders.lock().unwrap().clone()
    }
}

impl LeaderListener for RecordingListener {
    fn on_start_leading(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_stop_leading(&self) {
        self.stopped.fetch_add(1, Ordering::SeqCst);
    }

    fn on_new_leader(&self, identity: &str) {
        self.new_leaders.lock().unwrap().push(identity.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Op {
    Get,
    Create,
    CompareAndSwap,
}

type WriteHook = Box<dyn FnOnce(&FaultyStore) + Send>;

/// An in-memory store that counts write attempts and injects faults.
#[derive(Default)]
pub(crate) struct FaultyStore {
    pub(crate) inner: InMemoryLeaseStore,
    writes: AtomicUsize,
    faults: Mutex<Vec<Op>>,
    before_write: Mutex<Option<WriteHook>>,
}

impl FaultyStore {
    /// Number of create and compare-and-swap calls, failed ones included.
    pub(crate) fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next call of `op` fail with a backend error.
    pub(crate) fn fail_next(&self, op: Op) {
        self.faults.lock().unwrap().push(op);
    }

    /// Run `hook` right before the next write, simulating another process
    /// sneaking in between our read and our write.
    pub(crate) fn before_next_write(&self, hook: impl FnOnce(&FaultyStore) + Send + 'static) {
        *self.before_write.lock().unwrap() = Some(Box::new(hook));
    }

    fn check(&self, op: Op) -> Result<(), StoreError> {
        if op != Op::Get {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let hook = self.before_write.lock().unwrap().take();
            if let Some(hook) = hook {
                hook(self);
            }
        }

        let mut faults = self.faults.lock().unwrap();
        match faults.iter().position(|fault| *fault == op) {
            Some(index) => {
                faults.remove(index);
                Err(StoreError::Backend(anyhow::anyhow!("injected {op:?} failure")))
            }
            None => Ok(()),
        }
    }
}

#[async_trait]
impl LeaseStore for FaultyStore {
    async fn get(&self, key: &LeaseKey) -> Result<Option<LeaseRecord>, StoreError> {
        self.check(Op::Get)?;
        self.inner.get(key).await
    }

    async fn create(&self, key: &LeaseKey, spec: LeaseSpec) -> Result<Version, StoreError> {
        self.check(Op::Create)?;
        self.inner.create(key, spec).await
    }

    async fn compare_and_swap(
        &self,
        key: &LeaseKey,
        spec: LeaseSpec,
        expected: &Version,
    ) -> Result<Version, StoreError> {
        self.check(Op::CompareAndSwap)?;
        self.inner.compare_and_swap(key, spec, expected).await
    }
}
