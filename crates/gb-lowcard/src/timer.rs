use super::keys;
use gb_core::EpochMs;
use gb_core::ID;
use gb_core::Room;
use gb_core::Round;
use gb_core::TIMER_TTL_SECS;
use gb_core::now_ms;
use gb_keyed::KeyedStore;
use gb_keyed::StoreError;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Which transition fires when this timer expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Join window closes: begin the game or refund.
    Join,
    /// Pre-round countdown ends: draws open.
    Countdown,
    /// Draw window closes: auto-draw stragglers and tally.
    Round,
}

/// A phase deadline stored as data.
///
/// Deadlines are not suspended computations; they live in the keyed store
/// so they survive restarts and any replica's poller can fire them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Timer {
    pub phase: Phase,
    pub expires_at: EpochMs,
    pub round_number: Round,
    pub created_at: EpochMs,
}

impl Timer {
    pub fn expired(&self, now: EpochMs) -> bool {
        now >= self.expires_at
    }
}

/// Timer records per room, self-cleaning via TTL plus explicit clears on
/// every terminal transition.
#[derive(Clone)]
pub struct Timers {
    store: Arc<dyn KeyedStore>,
}

impl Timers {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }
    pub async fn set(
        &self,
        room: ID<Room>,
        phase: Phase,
        expires_at: EpochMs,
        round: Round,
    ) -> Result<(), StoreError> {
        let timer = Timer {
            phase,
            expires_at,
            round_number: round,
            created_at: now_ms(),
        };
        let json = serde_json::to_string(&timer).expect("serialize timer");
        self.store
            .set(
                &keys::timer_key(room),
                &json,
                Duration::from_secs(TIMER_TTL_SECS),
            )
            .await
    }
    pub async fn read(&self, room: ID<Room>) -> Result<Option<Timer>, StoreError> {
        let raw = self.store.get(&keys::timer_key(room)).await?;
        Ok(raw.and_then(|json| serde_json::from_str(&json).ok()))
    }
    pub async fn clear(&self, room: ID<Room>) -> Result<(), StoreError> {
        self.store.del(&keys::timer_key(room)).await
    }
    /// All live timers, keyed by room. Unparseable records are skipped.
    pub async fn scan(&self) -> Result<Vec<(ID<Room>, Timer)>, StoreError> {
        let mut found = Vec::new();
        for key in self.store.keys(keys::TIMER_PATTERN).await? {
            let Some(room) = keys::room_from_timer_key(&key) else {
                continue;
            };
            if let Some(raw) = self.store.get(&key).await? {
                match serde_json::from_str(&raw) {
                    Ok(timer) => found.push((room, timer)),
                    Err(e) => log::warn!("[timers] bad record at {}: {}", key, e),
                }
            }
        }
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_keyed::MemoryStore;

    #[tokio::test]
    async fn set_read_clear() {
        let timers = Timers::new(Arc::new(MemoryStore::new()));
        let room: ID<Room> = ID::default();
        timers.set(room, Phase::Join, now_ms() + 30_000, 0).await.unwrap();
        let timer = timers.read(room).await.unwrap().expect("timer present");
        assert_eq!(timer.phase, Phase::Join);
        assert!(!timer.expired(now_ms()));
        timers.clear(room).await.unwrap();
        assert!(timers.read(room).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn scan_finds_expired() {
        let timers = Timers::new(Arc::new(MemoryStore::new()));
        let room: ID<Room> = ID::default();
        timers.set(room, Phase::Round, now_ms() - 1, 2).await.unwrap();
        let found = timers.scan().await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].0, room);
        assert!(found[0].1.expired(now_ms()));
    }
}
