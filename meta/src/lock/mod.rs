//! Catalog wide mutual exclusion for schema creation, migration and removal.

use std::fmt::Debug;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use trace::{debug, warn};

use crate::error::MetaResult;

pub mod local;
pub mod store_lock;

pub use local::LocalLock;
pub use store_lock::StoreLock;

#[async_trait]
pub trait DistributedLock: Send + Sync + Debug {
    /// Waits up to `timeout` for the lock at `path`, failing with
    /// `LockTimeout` once it elapses.
    async fn acquire(&self, path: &str, timeout: Duration) -> MetaResult<LockGuard>;
}

/// The held side of an acquired lock.
#[async_trait]
pub trait LockLease: Send + Sync + Debug {
    async fn release(&self) -> MetaResult<()>;

    /// Called when a guard is dropped without being released. Must not
    /// block.
    fn release_on_drop(&self);
}

/// A held lock. Call [`LockGuard::release`] on every exit path; dropping the
/// guard releases it as a fallback.
#[derive(Debug)]
pub struct LockGuard {
    path: String,
    acquired_at: Instant,
    lease: Option<Box<dyn LockLease>>,
}

impl LockGuard {
    pub fn new(path: impl Into<String>, lease: Box<dyn LockLease>) -> Self {
        Self {
            path: path.into(),
            acquired_at: Instant::now(),
            lease: Some(lease),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Release failures are logged, the lease expires on its own.
    pub async fn release(mut self) {
        if let Some(lease) = self.lease.take() {
            match lease.release().await {
                Ok(()) => debug!(
                    "released lock {} after {:?}",
                    self.path,
                    self.acquired_at.elapsed()
                ),
                Err(err) => warn!("failed to release lock {}: {}", self.path, err),
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(lease) = self.lease.take() {
            warn!("lock {} dropped without release", self.path);
            lease.release_on_drop();
        }
    }
}
