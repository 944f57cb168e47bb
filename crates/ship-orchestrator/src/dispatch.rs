//! Background dispatch with at most one in-flight run per repository

use ship_core::TaskDescriptor;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::orchestrator::{Orchestrator, RunReport};

type RepoLock = Arc<tokio::sync::Mutex<()>>;

/// Spawns one task per descriptor. Runs for the same repository name are
/// serialized; different repositories run concurrently.
pub struct Dispatcher {
    orchestrator: Arc<Orchestrator>,
    locks: Mutex<HashMap<String, RepoLock>>,
}

impl Dispatcher {
    pub fn new(orchestrator: Arc<Orchestrator>) -> Arc<Self> {
        Arc::new(Self {
            orchestrator,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.orchestrator
    }

    /// Start a background run and return immediately
    pub fn dispatch(self: &Arc<Self>, task: TaskDescriptor) -> JoinHandle<RunReport> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.run_exclusive(task).await })
    }

    /// Run in the foreground, waiting for any in-flight run of the same
    /// repository first
    pub async fn run_exclusive(&self, task: TaskDescriptor) -> RunReport {
        // Declared before the lock so that it is dropped after it
        let lease = Lease {
            key: task.run_key().to_string(),
            dispatcher: self,
        };
        let lock = self.lock_for(&lease.key);

        let guard = lock.lock().await;
        debug!("Acquired run lock for {}", lease.key);
        let report = self.orchestrator.run(&task).await;
        drop(guard);
        report
    }

    /// Number of repositories with a queued or running run
    pub fn in_flight(&self) -> usize {
        self.locks().len()
    }

    fn locks(&self) -> std::sync::MutexGuard<'_, HashMap<String, RepoLock>> {
        match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn lock_for(&self, key: &str) -> RepoLock {
        self.locks()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Drop the repository's lock once nobody holds or waits on it
    fn prune(&self, key: &str) {
        let mut locks = self.locks();
        if locks
            .get(key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(key);
        }
    }
}

/// Prunes a repository's lock when dropped, including while unwinding
/// from a panicked run
struct Lease<'a> {
    key: String,
    dispatcher: &'a Dispatcher,
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        self.dispatcher.prune(&self.key);
    }
}
