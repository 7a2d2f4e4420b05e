use super::store::KeyedStore;
use super::store::StoreError;
use gb_core::GameKind;
use gb_core::ID;
use gb_core::Room;
use std::sync::Arc;

/// Hash key for the per-room active game type directory.
const ACTIVE_GAMES: &str = "room:active_games";

/// Per-room "which game type is active" directory.
///
/// The router honors this for scoped play commands, and bot managers
/// refuse to install over another game's active bot.
#[derive(Clone)]
pub struct ActiveGames {
    store: Arc<dyn KeyedStore>,
}

impl ActiveGames {
    pub fn new(store: Arc<dyn KeyedStore>) -> Self {
        Self { store }
    }
    pub async fn get(&self, room: ID<Room>) -> Result<Option<GameKind>, StoreError> {
        let field = room.to_string();
        Ok(self
            .store
            .hget(ACTIVE_GAMES, &field)
            .await?
            .and_then(|s| GameKind::try_from(s.as_str()).ok()))
    }
    pub async fn set(&self, room: ID<Room>, kind: GameKind) -> Result<(), StoreError> {
        let field = room.to_string();
        self.store
            .hset(ACTIVE_GAMES, &field, &kind.to_string())
            .await
    }
    pub async fn clear(&self, room: ID<Room>) -> Result<(), StoreError> {
        let field = room.to_string();
        self.store.hdel(ACTIVE_GAMES, &field).await
    }
}
