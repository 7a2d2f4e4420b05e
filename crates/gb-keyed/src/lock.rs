use super::store::KeyedStore;
use super::store::StoreError;
use std::sync::Arc;
use std::time::Duration;

/// Named mutexes with TTL over the keyed store.
///
/// Two replicas (or the timer poller racing a user command) can otherwise
/// interleave reads and writes of a game snapshot, so every state-mutating
/// operation holds the appropriate lock for the whole mutation. Locks
/// self-release via TTL if a holder dies.
#[derive(Clone)]
pub struct LockManager {
    store: Arc<dyn KeyedStore>,
}

impl LockManager {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }
    /// Atomic "set if absent" with TTL. Returns a guard holding a random
    /// 16-hex token on success, None if the lock is held elsewhere.
    pub async fn acquire(
        &self,
        key: &str,
        ttl: Duration,
    ) -> Result<Option<LockGuard>, StoreError> {
        let token = format!("{:016x}", rand::random::<u64>());
        match self.store.set_nx(key, &token, ttl).await? {
            true => Ok(Some(LockGuard {
                store: self.store.clone(),
                key: key.to_string(),
                token,
                released: false,
            })),
            false => Ok(None),
        }
    }
    /// Up to `attempts` tries with fixed-delay backoff.
    pub async fn acquire_with_retry(
        &self,
        key: &str,
        ttl: Duration,
        attempts: u32,
        delay: Duration,
    ) -> Result<Option<LockGuard>, StoreError> {
        for attempt in 0..attempts {
            if let Some(guard) = self.acquire(key, ttl).await? {
                return Ok(Some(guard));
            }
            if attempt + 1 < attempts {
                tokio::time::sleep(delay).await;
            }
        }
        log::debug!("[lock] exhausted retries on {}", key);
        Ok(None)
    }
}

/// A held lock. Token-bound release: TTL expiry followed by a new acquirer
/// must not be released by the stale holder.
///
/// Release explicitly on the happy path; a guard dropped without release
/// (early return, panic) schedules a background compare-and-delete so the
/// slot frees before its TTL where possible.
pub struct LockGuard {
    store: Arc<dyn KeyedStore>,
    key: String,
    token: String,
    released: bool,
}

impl LockGuard {
    pub fn token(&self) -> &str {
        &self.token
    }
    /// Deletes the lock only if it still holds this guard's token.
    /// Returns true if this call released the slot.
    pub async fn release(mut self) -> bool {
        self.released = true;
        match self
            .store
            .compare_and_delete(&self.key, &self.token)
            .await
        {
            Ok(owned) => {
                if !owned {
                    log::debug!("[lock] {} expired before release", self.key);
                }
                owned
            }
            Err(e) => {
                log::warn!("[lock] release of {} failed: {}", self.key, e);
                false
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let store = self.store.clone();
        let key = std::mem::take(&mut self.key);
        let token = std::mem::take(&mut self.token);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = store.compare_and_delete(&key, &token).await;
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;

    fn manager() -> (LockManager, Arc<dyn KeyedStore>) {
        let store: Arc<dyn KeyedStore> = Arc::new(MemoryStore::new());
        (LockManager::new(store.clone()), store)
    }

    #[tokio::test]
    async fn acquire_release_round_trip() {
        let (locks, _) = manager();
        let ttl = Duration::from_secs(30);
        let guard = locks.acquire("l", ttl).await.unwrap().expect("free slot");
        assert!(locks.acquire("l", ttl).await.unwrap().is_none());
        assert!(guard.release().await);
        assert!(locks.acquire("l", ttl).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn release_never_steals_foreign_lock() {
        let (locks, store) = manager();
        let ttl = Duration::from_secs(30);
        let stale = locks.acquire("l", ttl).await.unwrap().expect("free slot");
        // Simulate TTL expiry plus re-acquisition by a second party.
        store.del("l").await.unwrap();
        let fresh = locks.acquire("l", ttl).await.unwrap().expect("free slot");
        let fresh_token = fresh.token().to_string();
        assert!(!stale.release().await);
        assert_eq!(store.get("l").await.unwrap(), Some(fresh_token));
    }

    #[tokio::test]
    async fn retry_acquires_after_release() {
        let (locks, _) = manager();
        let ttl = Duration::from_secs(30);
        let held = locks.acquire("l", ttl).await.unwrap().unwrap();
        let locks2 = locks.clone();
        let waiter = tokio::spawn(async move {
            locks2
                .acquire_with_retry("l", ttl, 10, Duration::from_millis(20))
                .await
                .unwrap()
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        held.release().await;
        assert!(waiter.await.unwrap().is_some());
    }
}
