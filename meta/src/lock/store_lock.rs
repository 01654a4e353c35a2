use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use models::utils::now_timestamp_millis;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use trace::{debug, warn};

use crate::error::{MetaError, MetaResult};
use crate::lock::{DistributedLock, LockGuard, LockLease};
use crate::store::{Authorizations, KeyValueStore};

/// Row stored under the lock path while the lock is held.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct LeaseRecord {
    owner: String,
    token: String,
    expires_at: i64,
}

impl LeaseRecord {
    fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// A lock shared by every client of the same store. Each acquisition
/// writes a lease row with compare-and-swap; leases older than `ttl` are
/// taken over so a crashed holder can not block the catalog forever.
#[derive(Debug)]
pub struct StoreLock {
    store: Arc<dyn KeyValueStore>,
    table: String,
    owner: String,
    ttl: Duration,
    retry_interval: Duration,
    table_ready: OnceCell<()>,
}

impl StoreLock {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        table: impl Into<String>,
        ttl: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            store,
            table: table.into(),
            owner: uuid::Uuid::new_v4().to_string(),
            ttl,
            retry_interval,
            table_ready: OnceCell::new(),
        }
    }

    async fn ensure_table(&self) -> MetaResult<()> {
        self.table_ready
            .get_or_try_init(|| async {
                self.store.create_table_if_absent(&self.table).await?;
                Ok::<(), MetaError>(())
            })
            .await?;
        Ok(())
    }

    fn encode(record: &LeaseRecord) -> MetaResult<Vec<u8>> {
        serde_json::to_vec(record).map_err(|e| MetaError::SerdeMsgEncode { err: e.to_string() })
    }

    /// One acquisition attempt. Returns the written lease on success.
    async fn try_acquire(&self, path: &str) -> MetaResult<Option<Vec<u8>>> {
        let key = path.as_bytes();
        let now = now_timestamp_millis();
        let record = LeaseRecord {
            owner: self.owner.clone(),
            token: uuid::Uuid::new_v4().to_string(),
            expires_at: now + self.ttl.as_millis() as i64,
        };
        let value = Self::encode(&record)?;

        let current = self
            .store
            .get(&self.table, key, &Authorizations::empty())
            .await?;
        let expected = match &current {
            None => None,
            Some(bytes) => match serde_json::from_slice::<LeaseRecord>(bytes) {
                Ok(held) if !held.is_expired(now) => return Ok(None),
                Ok(held) => {
                    warn!(
                        "taking over expired lease of {} on {}",
                        held.owner, path
                    );
                    Some(bytes.as_slice())
                }
                // unreadable leases are treated as expired
                Err(_) => Some(bytes.as_slice()),
            },
        };

        let swapped = self
            .store
            .compare_and_swap(&self.table, key, expected, Some(value.clone()))
            .await?;
        Ok(swapped.then_some(value))
    }
}

#[async_trait]
impl DistributedLock for StoreLock {
    async fn acquire(&self, path: &str, timeout: Duration) -> MetaResult<LockGuard> {
        self.ensure_table().await?;

        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(value) = self.try_acquire(path).await? {
                debug!("acquired lock {} as {}", path, self.owner);
                return Ok(LockGuard::new(
                    path,
                    Box::new(StoreLease {
                        store: self.store.clone(),
                        table: self.table.clone(),
                        key: path.as_bytes().to_vec(),
                        value,
                    }),
                ));
            }

            let now = tokio::time::Instant::now();
            if now >= deadline {
                return Err(MetaError::LockTimeout {
                    path: path.to_string(),
                    timeout,
                });
            }
            tokio::time::sleep(self.retry_interval.min(deadline - now)).await;
        }
    }
}

#[derive(Debug)]
struct StoreLease {
    store: Arc<dyn KeyValueStore>,
    table: String,
    key: Vec<u8>,
    value: Vec<u8>,
}

#[async_trait]
impl LockLease for StoreLease {
    async fn release(&self) -> MetaResult<()> {
        // a lease taken over after expiry is no longer ours to remove
        let released = self
            .store
            .compare_and_swap(&self.table, &self.key, Some(&self.value), None)
            .await?;
        if !released {
            warn!(
                "lease on {} was taken over before release",
                String::from_utf8_lossy(&self.key)
            );
        }
        Ok(())
    }

    fn release_on_drop(&self) {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => return,
        };
        let store = self.store.clone();
        let table = self.table.clone();
        let key = self.key.clone();
        let value = self.value.clone();
        handle.spawn(async move {
            if let Err(err) = store
                .compare_and_swap(&table, &key, Some(&value), None)
                .await
            {
                warn!("failed to release dropped lease: {}", err);
            }
        });
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;
    use std::time::Duration;

    use super::{LeaseRecord, StoreLock};
    use crate::error::MetaError;
    use crate::lock::DistributedLock;
    use crate::store::{KeyValueStore, MemoryStore, Mutation};

    fn store_lock(store: Arc<MemoryStore>, ttl: Duration) -> StoreLock {
        StoreLock::new(store, "geomesa_locks", ttl, Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_exclusion() {
        let store = Arc::new(MemoryStore::new());
        let a = store_lock(store.clone(), Duration::from_secs(60));
        let b = store_lock(store.clone(), Duration::from_secs(60));

        let guard = a.acquire("/geometa/catalog/geomesa", Duration::from_secs(1)).await.unwrap();
        let err = b
            .acquire("/geometa/catalog/geomesa", Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(err, MetaError::LockTimeout { .. }));
        // not reentrant either
        assert!(a
            .acquire("/geometa/catalog/geomesa", Duration::from_millis(30))
            .await
            .is_err());

        guard.release().await;
        assert_eq!(store.row_count("geomesa_locks"), 0);
        b.acquire("/geometa/catalog/geomesa", Duration::from_millis(30))
            .await
            .unwrap()
            .release()
            .await;
    }

    #[tokio::test]
    async fn test_expired_lease_is_taken_over() {
        let store = Arc::new(MemoryStore::new());
        store.create_table_if_absent("geomesa_locks").await.unwrap();
        let stale = LeaseRecord {
            owner: "crashed".to_string(),
            token: "t".to_string(),
            expires_at: 0,
        };
        store
            .write(
                "geomesa_locks",
                vec![Mutation::put(
                    "/geometa/catalog/geomesa",
                    serde_json::to_vec(&stale).unwrap(),
                )],
            )
            .await
            .unwrap();

        let lock = store_lock(store.clone(), Duration::from_secs(60));
        lock.acquire("/geometa/catalog/geomesa", Duration::from_millis(50))
            .await
            .unwrap()
            .release()
            .await;
    }

    #[tokio::test]
    async fn test_dropped_guard_releases() {
        let store = Arc::new(MemoryStore::new());
        let lock = store_lock(store.clone(), Duration::from_secs(60));
        let guard = lock.acquire("/p", Duration::from_secs(1)).await.unwrap();
        drop(guard);
        // the release runs on a spawned task
        lock.acquire("/p", Duration::from_secs(1))
            .await
            .unwrap()
            .release()
            .await;
    }
}
