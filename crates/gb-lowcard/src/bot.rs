use super::engine::LowCard;
use super::engine::Reply;
use super::keys;
use super::repository::GameRepository;
use gb_core::BOT_TTL_SECS;
use gb_core::Coins;
use gb_core::EpochMs;
use gb_core::GameKind;
use gb_core::ID;
use gb_core::MIN_ENTRY;
use gb_core::Room;
use gb_core::User;
use gb_core::now_ms;
use gb_keyed::ActiveGames;
use gb_keyed::KeyedStore;
use serde::Deserialize;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Bot-enabled record at `lowcard:bot:{room}`, 7-day TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotRecord {
    pub active: bool,
    pub default_amount: Coins,
    pub created_at: EpochMs,
}

impl BotRecord {
    pub fn new() -> Self {
        Self {
            active: true,
            default_amount: MIN_ENTRY,
            created_at: now_ms(),
        }
    }
}

impl Default for BotRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// Admin install/remove of the LowCard bot for a room.
pub struct BotManager {
    store: Arc<dyn KeyedStore>,
    games: Arc<dyn GameRepository>,
    active: ActiveGames,
    engine: Arc<LowCard>,
}

impl BotManager {
    pub fn new(
        store: Arc<dyn KeyedStore>,
        games: Arc<dyn GameRepository>,
        engine: Arc<LowCard>,
    ) -> Self {
        Self {
            active: ActiveGames::new(store.clone()),
            store,
            games,
            engine,
        }
    }

    /// `/bot lowcard add` — room admins and system admins only; refuses
    /// while another game's bot is active in the room.
    pub async fn add(&self, room: ID<Room>, user: ID<User>) -> Reply {
        match self.games.is_room_admin(room, user).await {
            Ok(true) => {}
            Ok(false) => return Reply::reject("Only room admins can manage bots."),
            Err(e) => {
                log::error!("[bot {}] admin check failed: {}", room, e);
                return Reply::reject("Server error, please try again.");
            }
        }
        match self.active.get(room).await {
            Ok(Some(kind)) if kind != GameKind::LowCard => {
                return Reply::reject(format!("The {} bot is already active in this room.", kind));
            }
            Ok(_) => {}
            Err(e) => {
                log::error!("[bot {}] directory read failed: {}", room, e);
                return Reply::reject("Server error, please try again.");
            }
        }
        for foreign in ["dicebot", "flagbot"] {
            let key = format!("{}:bot:{}", foreign, room);
            match self.store.get(&key).await {
                Ok(Some(_)) => {
                    return Reply::reject("Another game bot is already active in this room.");
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("[bot {}] foreign bot check failed: {}", room, e);
                    return Reply::reject("Server error, please try again.");
                }
            }
        }
        let record = serde_json::to_string(&BotRecord::new()).expect("serialize bot record");
        if let Err(e) = self
            .store
            .set(&keys::bot_key(room), &record, Duration::from_secs(BOT_TTL_SECS))
            .await
        {
            log::error!("[bot {}] install failed: {}", room, e);
            return Reply::reject("Server error, please try again.");
        }
        if let Err(e) = self.active.set(room, GameKind::LowCard).await {
            log::error!("[bot {}] directory write failed: {}", room, e);
        }
        log::info!("[bot {}] lowcard bot installed by {}", room, user);
        Reply::confide("Bot is running")
    }

    /// `/bot lowcard remove` — refunds anyone still staked, then deletes
    /// the bot, deck, and game keys and clears the active game type.
    pub async fn remove(&self, room: ID<Room>, user: ID<User>) -> Reply {
        match self.games.is_room_admin(room, user).await {
            Ok(true) => {}
            Ok(false) => return Reply::reject("Only room admins can manage bots."),
            Err(e) => {
                log::error!("[bot {}] admin check failed: {}", room, e);
                return Reply::reject("Server error, please try again.");
            }
        }
        // reset refunds a waiting game in full and scrubs game/deck/timer.
        self.engine.reset_game(room, "bot removal").await;
        if let Err(e) = self.store.del(&keys::bot_key(room)).await {
            log::error!("[bot {}] bot key delete failed: {}", room, e);
        }
        if let Err(e) = self.active.clear(room).await {
            log::error!("[bot {}] directory clear failed: {}", room, e);
        }
        log::info!("[bot {}] lowcard bot removed by {}", room, user);
        Reply::confide("LowCard bot removed.")
    }

    /// Whether the LowCard bot is installed in this room.
    pub async fn is_active(&self, room: ID<Room>) -> bool {
        matches!(self.store.get(&keys::bot_key(room)).await, Ok(Some(_)))
    }
}
