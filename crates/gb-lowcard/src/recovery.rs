//! Boot-time refund sweep.
//!
//! A crash can strand debited entries in the keyed store. On engine boot,
//! every in-flight game found there is refunded in full and its keys are
//! deleted. The sweep is idempotent: a second run finds nothing because
//! the first one erased the state it acted on.

use super::keys;
use gb_core::Coins;
use gb_core::ID;
use gb_core::Room;
use gb_core::User;
use gb_keyed::KeyedStore;
use gb_keyed::StoreError;
use gb_ledger::Ledger;
use serde::Deserialize;
use std::sync::Arc;

/// Lenient player shape shared by the game-state sweeps.
#[derive(Debug, Deserialize)]
struct SweptPlayer {
    #[serde(alias = "userId")]
    user_id: ID<User>,
    username: String,
}

/// Lenient game shape: enough of any engine's snapshot to refund it.
#[derive(Debug, Deserialize)]
struct SweptGame {
    #[serde(alias = "entryAmount")]
    entry_amount: Coins,
    status: String,
    #[serde(default)]
    players: Vec<SweptPlayer>,
}

/// One recorded FlagBot bet.
#[derive(Debug, Deserialize)]
struct SweptBet {
    #[serde(alias = "userId")]
    user_id: ID<User>,
    username: String,
    amount: Coins,
}

/// Sweeps all in-flight game state and refunds every recorded player.
/// Returns the number of refunds issued.
pub async fn sweep(store: &Arc<dyn KeyedStore>, ledger: &Ledger) -> Result<usize, StoreError> {
    let mut refunded = 0;
    refunded += sweep_games(store, ledger, keys::LOWCARD_GAME_PATTERN, "LowCard").await?;
    refunded += sweep_games(store, ledger, keys::DICEBOT_GAME_PATTERN, "DiceBot").await?;
    refunded += sweep_bets(store, ledger).await?;
    match refunded {
        0 => log::info!("[recovery] no in-flight games found"),
        n => log::warn!("[recovery] refunded {} in-flight entries", n),
    }
    Ok(refunded)
}

async fn sweep_games(
    store: &Arc<dyn KeyedStore>,
    ledger: &Ledger,
    pattern: &str,
    game_type: &str,
) -> Result<usize, StoreError> {
    let mut refunded = 0;
    for key in store.keys(pattern).await? {
        let Some(room) = keys::room_from_game_key(&key) else {
            log::warn!("[recovery] unparseable key {}, deleting", key);
            store.del(&key).await?;
            continue;
        };
        let Some(raw) = store.get(&key).await? else {
            continue;
        };
        match serde_json::from_str::<SweptGame>(&raw) {
            Ok(game) if matches!(game.status.as_str(), "waiting" | "playing") => {
                let reason = format!("{} Refund - Server Restart (Room {})", game_type, room);
                for player in &game.players {
                    refund(ledger, room, player.user_id, &player.username, game.entry_amount, &reason)
                        .await;
                    refunded += 1;
                }
            }
            Ok(_) => {}
            Err(e) => log::warn!("[recovery] unreadable game at {}: {}", key, e),
        }
        store.del(&key).await?;
        cleanup_room_keys(store, room, game_type).await;
    }
    Ok(refunded)
}

async fn sweep_bets(store: &Arc<dyn KeyedStore>, ledger: &Ledger) -> Result<usize, StoreError> {
    let mut refunded = 0;
    for key in store.keys(keys::FLAGBOT_BETS_PATTERN).await? {
        let Some(room) = keys::room_from_bets_key(&key) else {
            log::warn!("[recovery] unparseable key {}, deleting", key);
            store.del(&key).await?;
            continue;
        };
        let Some(raw) = store.get(&key).await? else {
            continue;
        };
        match serde_json::from_str::<Vec<SweptBet>>(&raw) {
            Ok(bets) => {
                let reason = format!("FlagBot Refund - Server Restart (Room {})", room);
                for bet in &bets {
                    refund(ledger, room, bet.user_id, &bet.username, bet.amount, &reason).await;
                    refunded += 1;
                }
            }
            Err(e) => log::warn!("[recovery] unreadable bets at {}: {}", key, e),
        }
        store.del(&key).await?;
    }
    Ok(refunded)
}

async fn refund(
    ledger: &Ledger,
    room: ID<Room>,
    user: ID<User>,
    username: &str,
    amount: Coins,
    reason: &str,
) {
    match ledger.credit(user, amount, username, reason).await {
        Ok(_) => {
            ledger.invalidate(user).await;
            log::info!("[recovery] refunded {} COINS to {} (room {})", amount, username, room);
        }
        Err(e) => {
            log::error!(
                "[recovery] CRITICAL: refund of {} to {} failed: {}",
                amount,
                username,
                e
            );
        }
    }
}

async fn cleanup_room_keys(store: &Arc<dyn KeyedStore>, room: ID<Room>, game_type: &str) {
    let targets = match game_type {
        "LowCard" => vec![keys::deck_key(room), keys::timer_key(room)],
        "DiceBot" => vec![format!("dicebot:deck:{}", room)],
        _ => vec![],
    };
    for key in targets {
        if let Err(e) = store.del(&key).await {
            log::warn!("[recovery] cleanup of {} failed: {}", key, e);
        }
    }
}
