//! Core type aliases, traits, and constants for gamebot.
//!
//! This crate provides the foundational types and configuration parameters
//! used throughout the gamebot workspace.

// ============================================================================
// TYPE ALIASES
// ============================================================================
/// Virtual currency amounts (entries, pots, balances, fees).
pub type Coins = i64;
/// Round counter within a single game (0 while waiting).
pub type Round = u32;
/// Wall-clock instant as milliseconds since the UNIX epoch.
///
/// Deadlines are stored as plain data in the keyed store so that they
/// survive process restarts and can be driven by any replica's poller.
pub type EpochMs = i64;

// ============================================================================
// TRAITS
// ============================================================================
/// Random instance generation for testing.
pub trait Arbitrary {
    /// Generate a uniformly random instance.
    fn random() -> Self;
}

/// Unique identifier trait for domain entities.
pub trait Unique<T = Self> {
    fn id(&self) -> ID<T>;
}

// ============================================================================
// IDENTITY TYPES
// ============================================================================
use std::cmp::Ordering;
use std::fmt::Debug;
use std::fmt::Display;
use std::fmt::Formatter;
use std::hash::Hash;
use std::hash::Hasher;
use std::marker::PhantomData;

/// Generic ID wrapper providing compile-time type safety over uuid::Uuid.
pub struct ID<T> {
    inner: uuid::Uuid,
    marker: PhantomData<T>,
}

impl<T> ID<T> {
    pub fn inner(&self) -> uuid::Uuid {
        self.inner
    }
    /// Cast ID<T> to ID<U> while preserving the underlying UUID.
    pub fn cast<U>(self) -> ID<U> {
        ID {
            inner: self.inner,
            marker: PhantomData,
        }
    }
    /// Parse from the canonical hyphenated string form.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(Self::from)
    }
}

impl<T> From<ID<T>> for uuid::Uuid {
    fn from(id: ID<T>) -> Self {
        id.inner()
    }
}
impl<T> From<uuid::Uuid> for ID<T> {
    fn from(inner: uuid::Uuid) -> Self {
        Self {
            inner,
            marker: PhantomData,
        }
    }
}

impl<T> Default for ID<T> {
    fn default() -> Self {
        Self {
            inner: uuid::Uuid::now_v7(),
            marker: PhantomData,
        }
    }
}

impl<T> Copy for ID<T> {}
impl<T> Clone for ID<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Eq for ID<T> {}
impl<T> PartialEq for ID<T> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<T> Ord for ID<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.inner.cmp(&other.inner)
    }
}
impl<T> PartialOrd for ID<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Hash for ID<T> {
    fn hash<H>(&self, state: &mut H)
    where
        H: Hasher,
    {
        self.inner.hash(state);
    }
}

impl<T> Debug for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ID").field(&self.inner).finish()
    }
}
impl<T> Display for ID<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.inner, f)
    }
}

impl<T> serde::Serialize for ID<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.inner.serialize(serializer)
    }
}
impl<'de, T> serde::Deserialize<'de> for ID<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        uuid::Uuid::deserialize(deserializer).map(Self::from)
    }
}

// ============================================================================
// DOMAIN MARKERS
// ============================================================================
/// Marker for chat user identities.
pub struct User;
/// Marker for chat room identities.
pub struct Room;

/// The games this process knows how to route commands for.
///
/// Only LowCard runs in this engine; the other kinds exist so the router
/// and the bot manager can recognize their commands and refuse conflicts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameKind {
    Dice,
    LowCard,
    Flag,
}

impl Display for GameKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            GameKind::Dice => write!(f, "dice"),
            GameKind::LowCard => write!(f, "lowcard"),
            GameKind::Flag => write!(f, "flagh"),
        }
    }
}

impl TryFrom<&str> for GameKind {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "dice" => Ok(GameKind::Dice),
            "lowcard" => Ok(GameKind::LowCard),
            "flagh" => Ok(GameKind::Flag),
            _ => Err(format!("unknown game kind: {}", s)),
        }
    }
}

// ============================================================================
// CLOCK
// ============================================================================
/// Current wall-clock time in milliseconds since the UNIX epoch.
pub fn now_ms() -> EpochMs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_millis() as EpochMs
}

// ============================================================================
// GAME LIFECYCLE PARAMETERS
// ============================================================================
/// Join window after a game is started (seconds).
pub const JOIN_WINDOW_SECS: u64 = 30;
/// Pre-round countdown before draws open (seconds).
pub const COUNTDOWN_SECS: u64 = 3;
/// Draw window after the countdown ends (seconds).
pub const ROUND_TIMEOUT_SECS: u64 = 20;
/// A waiting game this far past its join deadline is stale (seconds).
pub const STALE_GRACE_SECS: u64 = 120;
/// A waiting game this old with no live timer is stuck (seconds).
pub const STUCK_GAME_SECS: u64 = 40;

// ============================================================================
// ENTRY BOUNDS
// ============================================================================
/// Minimum per-player entry in a normal room.
pub const MIN_ENTRY: Coins = 1;
/// Maximum per-player entry in a normal room.
pub const MAX_ENTRY: Coins = 999_999_999;
/// Minimum per-player entry in a "big game" room (no maximum applies).
pub const BIG_GAME_MIN_ENTRY: Coins = 50;
/// Substring of a room name that marks it as a "big game" room.
pub const BIG_GAME_MARKER: &str = "big game";

// ============================================================================
// FEES
// ============================================================================
/// House fee, percent of the pot retained on finish.
pub const HOUSE_FEE_PERCENT: Coins = 10;
/// Merchant commission, percent of the house fee paid to the starter's
/// tagged merchant. Truncates toward zero.
pub const MERCHANT_COMMISSION_PERCENT: Coins = 10;

// ============================================================================
// KEYED STORE TTLS (seconds)
// ============================================================================
/// Game snapshot and deck TTL, refreshed on each mutation.
pub const GAME_TTL_SECS: u64 = 3600;
/// Phase timer TTL. Timers are self-cleaning beyond explicit clears.
pub const TIMER_TTL_SECS: u64 = 120;
/// Bot-enabled record TTL.
pub const BOT_TTL_SECS: u64 = 7 * 24 * 3600;
/// Cached balance TTL.
pub const BALANCE_CACHE_TTL_SECS: u64 = 300;

// ============================================================================
// LOCKS
// ============================================================================
/// Start-phase mutex TTL (seconds).
pub const START_LOCK_TTL_SECS: u64 = 30;
/// Join/begin mutex TTL (seconds).
pub const JOIN_LOCK_TTL_SECS: u64 = 15;
/// Draw mutex TTL (seconds).
pub const DRAW_LOCK_TTL_SECS: u64 = 15;
/// Retry budget for contended lock acquisition.
pub const LOCK_RETRY_ATTEMPTS: u32 = 5;
/// Fixed delay between lock retries (milliseconds).
pub const LOCK_RETRY_DELAY_MS: u64 = 100;

// ============================================================================
// TIMER POLLER
// ============================================================================
/// Interval between poller scans of the timer keyspace (milliseconds).
pub const POLL_INTERVAL_MS: u64 = 1000;

// ============================================================================
// RUNTIME UTILITIES
// ============================================================================
/// Initialize dual logging (terminal + file) with timestamped log files.
/// Creates `logs/` directory and writes DEBUG level to file, INFO to terminal.
pub fn log() {
    std::fs::create_dir_all("logs").expect("create logs directory");
    let config = simplelog::ConfigBuilder::new()
        .set_location_level(log::LevelFilter::Off)
        .set_target_level(log::LevelFilter::Off)
        .set_thread_level(log::LevelFilter::Off)
        .build();
    let time = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("time moves slow")
        .as_secs();
    let file = simplelog::WriteLogger::new(
        log::LevelFilter::Debug,
        config.clone(),
        std::fs::File::create(format!("logs/{}.log", time)).expect("create log file"),
    );
    let term = simplelog::TermLogger::new(
        log::LevelFilter::Info,
        config.clone(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    );
    simplelog::CombinedLogger::init(vec![term, file]).expect("initialize logger");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_cast_preserves_uuid() {
        let id: ID<User> = ID::default();
        let cast: ID<Room> = id.cast();
        assert_eq!(id.inner(), cast.inner());
    }

    #[test]
    fn id_parse_round_trip() {
        let id: ID<User> = ID::default();
        let parsed = ID::<User>::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn game_kind_string_round_trip() {
        for kind in [GameKind::Dice, GameKind::LowCard, GameKind::Flag] {
            assert_eq!(GameKind::try_from(kind.to_string().as_str()), Ok(kind));
        }
    }

    #[test]
    fn now_ms_is_monotonic_enough() {
        let a = now_ms();
        let b = now_ms();
        assert!(b >= a);
    }
}
