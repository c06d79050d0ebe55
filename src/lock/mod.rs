// ============================================================================
// Migration Lock
// ============================================================================
//
// Cluster-wide mutual exclusion per schema namespace. Exactly one process
// may plan and execute migrations for a namespace at a time; everyone else
// blocks until release or gives up at the timeout. The trait only fixes the
// acquire/timeout/release contract; deployments back it with the datastore's
// advisory locks or an external coordinator.
//
// ============================================================================

use std::collections::HashSet;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::core::StatementError;

#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    /// Try to take the namespace lock, waiting at most `timeout`.
    /// `Ok(false)` means the bound elapsed with the lock still held
    /// elsewhere; the error channel is for the lock backend itself failing.
    async fn try_acquire(&self, namespace: &str, timeout: Duration)
    -> Result<bool, StatementError>;

    async fn release(&self, namespace: &str) -> Result<(), StatementError>;
}

/// In-process advisory lock.
///
/// Mutual exclusion within one process: a mutexed held-set polled on a
/// short interval until the timeout. Suitable for embedded use and tests;
/// a multi-process deployment needs a datastore-backed implementation.
pub struct MemoryAdvisoryLock {
    held: Mutex<HashSet<String>>,
    poll_interval: Duration,
}

impl MemoryAdvisoryLock {
    pub fn new() -> Self {
        Self::with_poll_interval(Duration::from_millis(10))
    }

    pub fn with_poll_interval(poll_interval: Duration) -> Self {
        Self {
            held: Mutex::new(HashSet::new()),
            poll_interval,
        }
    }
}

impl Default for MemoryAdvisoryLock {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AdvisoryLock for MemoryAdvisoryLock {
    async fn try_acquire(
        &self,
        namespace: &str,
        timeout: Duration,
    ) -> Result<bool, StatementError> {
        let start = Instant::now();

        loop {
            {
                let mut held = self.held.lock().await;
                if !held.contains(namespace) {
                    held.insert(namespace.to_string());
                    return Ok(true);
                }
            }

            if start.elapsed() >= timeout {
                return Ok(false);
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn release(&self, namespace: &str) -> Result<(), StatementError> {
        self.held.lock().await.remove(namespace);
        Ok(())
    }
}
