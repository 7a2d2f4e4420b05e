use super::store::KeyedStore;
use super::store::StoreError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::mpsc::unbounded_channel;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn live(&self) -> bool {
        self.expires_at.map(|at| Instant::now() < at).unwrap_or(true)
    }
}

/// In-process keyed store.
///
/// Mirrors the Redis backend's semantics closely enough for tests and
/// single-node deployments: TTLs are evicted lazily on access, pub/sub is
/// fanned out over in-memory channels, and compare-and-delete is atomic
/// under the map mutex.
#[derive(Default)]
pub struct MemoryStore {
    data: Mutex<HashMap<String, Entry>>,
    hashes: Mutex<HashMap<String, HashMap<String, String>>>,
    channels: Mutex<HashMap<String, Vec<UnboundedSender<String>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
    fn expires(ttl: Duration) -> Option<Instant> {
        Some(Instant::now() + ttl)
    }
}

/// Glob matching with `*` wildcards only, as the timer scan and the
/// recovery sweep use it (`room:*:lowcard:timer`, `lowcard:game:*`).
fn glob_match(pattern: &str, key: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    match parts.len() {
        1 => pattern == key,
        _ => {
            let first = parts.first().expect("split is non-empty");
            let last = parts.last().expect("split is non-empty");
            if !key.starts_with(first) {
                return false;
            }
            let mut rest = &key[first.len()..];
            for mid in &parts[1..parts.len() - 1] {
                if mid.is_empty() {
                    continue;
                }
                match rest.find(mid) {
                    Some(i) => rest = &rest[i + mid.len()..],
                    None => return false,
                }
            }
            rest.ends_with(last)
        }
    }
}

#[async_trait]
impl KeyedStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut data = self.data.lock().expect("store mutex");
        match data.get(key) {
            Some(entry) if entry.live() => Ok(Some(entry.value.clone())),
            Some(_) => {
                data.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut data = self.data.lock().expect("store mutex");
        data.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Self::expires(ttl),
            },
        );
        Ok(())
    }
    async fn set_nx(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, StoreError> {
        let mut data = self.data.lock().expect("store mutex");
        match data.get(key) {
            Some(entry) if entry.live() => Ok(false),
            _ => {
                data.insert(
                    key.to_string(),
                    Entry {
                        value: value.to_string(),
                        expires_at: Self::expires(ttl),
                    },
                );
                Ok(true)
            }
        }
    }
    async fn del(&self, key: &str) -> Result<(), StoreError> {
        self.data.lock().expect("store mutex").remove(key);
        self.hashes.lock().expect("store mutex").remove(key);
        Ok(())
    }
    async fn compare_and_delete(&self, key: &str, expected: &str) -> Result<bool, StoreError> {
        let mut data = self.data.lock().expect("store mutex");
        match data.get(key) {
            Some(entry) if entry.live() && entry.value == expected => {
                data.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let mut data = self.data.lock().expect("store mutex");
        data.retain(|_, entry| entry.live());
        Ok(data
            .keys()
            .filter(|key| glob_match(pattern, key))
            .cloned()
            .collect())
    }
    async fn expire(&self, key: &str, ttl: Duration) -> Result<(), StoreError> {
        let mut data = self.data.lock().expect("store mutex");
        if let Some(entry) = data.get_mut(key) {
            entry.expires_at = Self::expires(ttl);
        }
        Ok(())
    }
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>, StoreError> {
        let hashes = self.hashes.lock().expect("store mutex");
        Ok(hashes.get(key).and_then(|h| h.get(field)).cloned())
    }
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<(), StoreError> {
        let mut hashes = self.hashes.lock().expect("store mutex");
        hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }
    async fn hdel(&self, key: &str, field: &str) -> Result<(), StoreError> {
        let mut hashes = self.hashes.lock().expect("store mutex");
        if let Some(hash) = hashes.get_mut(key) {
            hash.remove(field);
        }
        Ok(())
    }
    async fn publish(&self, channel: &str, payload: &str) -> Result<(), StoreError> {
        let mut channels = self.channels.lock().expect("store mutex");
        if let Some(subscribers) = channels.get_mut(channel) {
            subscribers.retain(|tx| tx.send(payload.to_string()).is_ok());
        }
        Ok(())
    }
    async fn subscribe(&self, channel: &str) -> Result<UnboundedReceiver<String>, StoreError> {
        let (tx, rx) = unbounded_channel();
        self.channels
            .lock()
            .expect("store mutex")
            .entry(channel.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn glob_exact() {
        assert!(glob_match("lowcard:game:r1", "lowcard:game:r1"));
        assert!(!glob_match("lowcard:game:r1", "lowcard:game:r2"));
    }

    #[test]
    fn glob_trailing_star() {
        assert!(glob_match("lowcard:game:*", "lowcard:game:r1"));
        assert!(!glob_match("lowcard:game:*", "lowcard:deck:r1"));
    }

    #[test]
    fn glob_middle_star() {
        assert!(glob_match("room:*:lowcard:timer", "room:r1:lowcard:timer"));
        assert!(!glob_match("room:*:lowcard:timer", "room:r1:dicebot:timer"));
    }

    #[tokio::test]
    async fn set_nx_respects_presence() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);
        assert!(store.set_nx("k", "a", ttl).await.unwrap());
        assert!(!store.set_nx("k", "b", ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some("a".to_string()));
    }

    #[tokio::test]
    async fn set_nx_after_expiry() {
        let store = MemoryStore::new();
        assert!(store.set_nx("k", "a", Duration::ZERO).await.unwrap());
        assert!(store.set_nx("k", "b", Duration::from_secs(30)).await.unwrap());
    }

    #[tokio::test]
    async fn compare_and_delete_checks_value() {
        let store = MemoryStore::new();
        store.set("k", "a", Duration::from_secs(30)).await.unwrap();
        assert!(!store.compare_and_delete("k", "b").await.unwrap());
        assert!(store.compare_and_delete("k", "a").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn keys_filters_by_pattern() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);
        store.set("room:a:lowcard:timer", "1", ttl).await.unwrap();
        store.set("room:b:lowcard:timer", "1", ttl).await.unwrap();
        store.set("lowcard:game:a", "1", ttl).await.unwrap();
        let mut keys = store.keys("room:*:lowcard:timer").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["room:a:lowcard:timer", "room:b:lowcard:timer"]);
    }

    #[tokio::test]
    async fn pubsub_round_trip() {
        let store = MemoryStore::new();
        let mut rx = store.subscribe("ch").await.unwrap();
        store.publish("ch", "hello").await.unwrap();
        assert_eq!(rx.recv().await, Some("hello".to_string()));
    }

    #[tokio::test]
    async fn hash_ops() {
        let store = MemoryStore::new();
        store.hset("h", "f", "v").await.unwrap();
        assert_eq!(store.hget("h", "f").await.unwrap(), Some("v".to_string()));
        store.hdel("h", "f").await.unwrap();
        assert_eq!(store.hget("h", "f").await.unwrap(), None);
    }
}
