use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use models::utils::{format_timestamp_millis, now_timestamp_millis};
use trace::{debug, warn};

use crate::store::KeyValueStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionCheck {
    /// The next check is not due yet, or another task is running it.
    Skipped,
    Matched,
    Mismatch { client: String, server: String },
    /// The store could not report its version.
    Unavailable,
}

/// Compares the client release with the store side release at most once
/// per interval. A mismatch is only logged.
#[derive(Debug)]
pub struct VersionChecker {
    client_version: String,
    interval: Duration,
    next_check: AtomicI64,
}

impl VersionChecker {
    /// The first check runs on first use.
    pub fn new(client_version: impl Into<String>, interval: Duration) -> Self {
        Self {
            client_version: client_version.into(),
            interval,
            next_check: AtomicI64::new(0),
        }
    }

    pub fn next_check_millis(&self) -> i64 {
        self.next_check.load(Ordering::SeqCst)
    }

    pub async fn check(&self, store: &dyn KeyValueStore) -> VersionCheck {
        let now = now_timestamp_millis();
        let due = self.next_check.load(Ordering::SeqCst);
        if now < due {
            return VersionCheck::Skipped;
        }
        let next = now + self.interval.as_millis() as i64;
        if self
            .next_check
            .compare_exchange(due, next, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return VersionCheck::Skipped;
        }

        let result = match store.server_version().await {
            Ok(server) if server == self.client_version => VersionCheck::Matched,
            Ok(server) => {
                warn!(
                    "Store side version {} does not match client version {}, \
                     install matching releases on both sides",
                    server, self.client_version
                );
                VersionCheck::Mismatch {
                    client: self.client_version.clone(),
                    server,
                }
            }
            Err(err) => {
                debug!("unable to read store side version: {}", err);
                VersionCheck::Unavailable
            }
        };
        debug!(
            "version check: {:?}, next check at {}",
            result,
            format_timestamp_millis(next)
        );
        result
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::{VersionCheck, VersionChecker};
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn test_check_once_per_interval() {
        let store = MemoryStore::with_server_version("2.4.0");
        let checker = VersionChecker::new("2.4.0", Duration::from_secs(3600));

        assert_eq!(checker.check(&store).await, VersionCheck::Matched);
        assert_eq!(checker.check(&store).await, VersionCheck::Skipped);
        assert_eq!(store.version_requests(), 1);
        assert!(checker.next_check_millis() > 0);
    }

    #[tokio::test]
    async fn test_mismatch_and_unavailable() {
        let store = MemoryStore::with_server_version("2.3.0");
        let checker = VersionChecker::new("2.4.0", Duration::ZERO);
        assert_eq!(
            checker.check(&store).await,
            VersionCheck::Mismatch {
                client: "2.4.0".to_string(),
                server: "2.3.0".to_string()
            }
        );

        store.set_server_version(None);
        assert_eq!(checker.check(&store).await, VersionCheck::Unavailable);
        assert_eq!(store.version_requests(), 2);
    }
}
