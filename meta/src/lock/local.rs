use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::OwnedMutexGuard;

use crate::error::{MetaError, MetaResult};
use crate::lock::{DistributedLock, LockGuard, LockLease};

/// Locks that only exclude tasks of this process.
#[derive(Debug, Default)]
pub struct LocalLock {
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl LocalLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
struct LocalLease {
    guard: Mutex<Option<OwnedMutexGuard<()>>>,
}

#[async_trait]
impl LockLease for LocalLease {
    async fn release(&self) -> MetaResult<()> {
        self.guard.lock().take();
        Ok(())
    }

    fn release_on_drop(&self) {
        self.guard.lock().take();
    }
}

#[async_trait]
impl DistributedLock for LocalLock {
    async fn acquire(&self, path: &str, timeout: Duration) -> MetaResult<LockGuard> {
        let mutex = self
            .locks
            .lock()
            .entry(path.to_string())
            .or_default()
            .clone();

        let guard = tokio::time::timeout(timeout, mutex.lock_owned())
            .await
            .map_err(|_| MetaError::LockTimeout {
                path: path.to_string(),
                timeout,
            })?;

        Ok(LockGuard::new(
            path,
            Box::new(LocalLease {
                guard: Mutex::new(Some(guard)),
            }),
        ))
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::LocalLock;
    use crate::error::MetaError;
    use crate::lock::DistributedLock;

    #[tokio::test]
    async fn test_exclusion_and_timeout() {
        let lock = LocalLock::new();
        let guard = lock.acquire("/a", Duration::from_secs(1)).await.unwrap();

        let err = lock
            .acquire("/a", Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(matches!(err, MetaError::LockTimeout { .. }));

        // other paths are independent
        let other = lock.acquire("/b", Duration::from_millis(20)).await.unwrap();
        other.release().await;

        guard.release().await;
        let again = lock.acquire("/a", Duration::from_millis(20)).await.unwrap();
        drop(again);
        lock.acquire("/a", Duration::from_millis(20))
            .await
            .unwrap()
            .release()
            .await;
    }
}
