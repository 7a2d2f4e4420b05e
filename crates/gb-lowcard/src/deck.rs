use super::keys;
use gb_cards::Card;
use gb_cards::Deck;
use gb_core::GAME_TTL_SECS;
use gb_core::ID;
use gb_core::Room;
use gb_keyed::KeyedStore;
use gb_keyed::StoreError;
use std::sync::Arc;
use std::time::Duration;

/// Per-room shuffled deck persisted in the keyed store.
///
/// Draws pop from the tail and rewrite the remainder. A missing or empty
/// key regenerates a fresh shuffle, so arbitrarily long games keep
/// drawing; 52 cards are ample in practice.
///
/// Accessed only from inside draw, auto-draw, and begin paths, which are
/// serialized per room, so read-modify-write here is safe.
#[derive(Clone)]
pub struct Decks {
    store: Arc<dyn KeyedStore>,
}

impl Decks {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }
    fn ttl() -> Duration {
        Duration::from_secs(GAME_TTL_SECS)
    }

    /// Pops one card, regenerating the deck if missing or exhausted.
    pub async fn draw(&self, room: ID<Room>) -> Result<Card, StoreError> {
        let key = keys::deck_key(room);
        let mut deck = match self.store.get(&key).await? {
            Some(json) => serde_json::from_str::<Vec<Card>>(&json)
                .map(Deck::from)
                .unwrap_or_else(|e| {
                    log::warn!("[decks] bad deck at {}: {}", key, e);
                    Deck::shuffled()
                }),
            None => Deck::shuffled(),
        };
        let card = match deck.draw() {
            Some(card) => card,
            None => {
                deck = Deck::shuffled();
                deck.draw().expect("fresh deck is non-empty")
            }
        };
        let json = serde_json::to_string(deck.cards()).expect("serialize deck");
        self.store.set(&key, &json, Self::ttl()).await?;
        Ok(card)
    }

    /// Writes a fresh shuffle for round 1.
    pub async fn reset(&self, room: ID<Room>) -> Result<(), StoreError> {
        let deck = Deck::shuffled();
        let json = serde_json::to_string(deck.cards()).expect("serialize deck");
        self.store.set(&keys::deck_key(room), &json, Self::ttl()).await
    }

    pub async fn delete(&self, room: ID<Room>) -> Result<(), StoreError> {
        self.store.del(&keys::deck_key(room)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gb_keyed::MemoryStore;
    use std::collections::HashSet;

    #[tokio::test]
    async fn draws_are_distinct_until_exhaustion() {
        let decks = Decks::new(Arc::new(MemoryStore::new()));
        let room: ID<Room> = ID::default();
        decks.reset(room).await.unwrap();
        let mut seen = HashSet::new();
        for _ in 0..52 {
            assert!(seen.insert(decks.draw(room).await.unwrap()));
        }
        // 53rd draw comes from a regenerated deck
        assert!(seen.contains(&decks.draw(room).await.unwrap()));
    }

    #[tokio::test]
    async fn draw_without_reset_regenerates() {
        let decks = Decks::new(Arc::new(MemoryStore::new()));
        let room: ID<Room> = ID::default();
        decks.draw(room).await.unwrap();
    }

    #[tokio::test]
    async fn preloaded_order_is_respected() {
        let store = Arc::new(MemoryStore::new());
        let decks = Decks::new(store.clone());
        let room: ID<Room> = ID::default();
        let cards: Vec<Card> = ["2h", "9d", "5c"]
            .iter()
            .map(|c| Card::try_from(*c).unwrap())
            .collect();
        store
            .set(
                &keys::deck_key(room),
                &serde_json::to_string(&cards).unwrap(),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        // tail first
        assert_eq!(decks.draw(room).await.unwrap().code(), "5c");
        assert_eq!(decks.draw(room).await.unwrap().code(), "9d");
        assert_eq!(decks.draw(room).await.unwrap().code(), "2h");
    }
}
