use gb_core::ID;
use gb_core::Room;

/// Bot-enabled record, 7-day TTL.
pub fn bot_key(room: ID<Room>) -> String {
    format!("lowcard:bot:{}", room)
}
/// Full game snapshot, 1 h TTL refreshed on each mutation.
pub fn game_key(room: ID<Room>) -> String {
    format!("lowcard:game:{}", room)
}
/// Ordered deck, created at round 1 and deleted with the game.
pub fn deck_key(room: ID<Room>) -> String {
    format!("lowcard:deck:{}", room)
}
/// Phase timer, 120 s TTL.
pub fn timer_key(room: ID<Room>) -> String {
    format!("room:{}:lowcard:timer", room)
}
/// Start-phase mutex, held only during `start_game`.
pub fn start_lock_key(room: ID<Room>) -> String {
    format!("lowcard:lock:{}", room)
}
/// Join/begin mutex.
pub fn join_lock_key(room: ID<Room>) -> String {
    format!("lowcard:joinlock:{}", room)
}
/// Draw mutex.
pub fn draw_lock_key(room: ID<Room>) -> String {
    format!("lowcard:drawlock:{}", room)
}

/// Scan pattern for the timer poller.
pub const TIMER_PATTERN: &str = "room:*:lowcard:timer";
/// Scan patterns for the restart recovery sweep.
pub const LOWCARD_GAME_PATTERN: &str = "lowcard:game:*";
pub const DICEBOT_GAME_PATTERN: &str = "dicebot:game:*";
pub const FLAGBOT_BETS_PATTERN: &str = "flagbot:room:*:bets";

/// Room id embedded in a timer key, if the key parses.
pub fn room_from_timer_key(key: &str) -> Option<ID<Room>> {
    key.strip_prefix("room:")
        .and_then(|rest| rest.strip_suffix(":lowcard:timer"))
        .and_then(|room| ID::parse(room).ok())
}

/// Room id embedded in a `<prefix>:game:{room}` key.
pub fn room_from_game_key(key: &str) -> Option<ID<Room>> {
    key.rsplit(':').next().and_then(|room| ID::parse(room).ok())
}

/// Room id embedded in a `flagbot:room:{room}:bets` key.
pub fn room_from_bets_key(key: &str) -> Option<ID<Room>> {
    key.strip_prefix("flagbot:room:")
        .and_then(|rest| rest.strip_suffix(":bets"))
        .and_then(|room| ID::parse(room).ok())
}
