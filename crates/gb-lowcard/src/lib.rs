//! The LowCard game engine.
//!
//! Users in a chat room stake COINS, draw one card per round, and the
//! lowest card is eliminated until a single winner takes the pot minus the
//! house fee. The engine is a per-room state machine with wall-clock
//! deadlines driven by an external polling tick; all volatile state lives
//! in the keyed store so any replica can advance any room.
//!
//! ## Architecture
//!
//! - [`Game`] — Typed per-room snapshot persisted in the keyed store
//! - [`LowCard`] — Engine entry points, serialized behind per-room locks
//! - [`Poller`] — Background loop that fires expired phase timers
//! - [`Decks`] — Per-room shuffled deck with atomic draws
//! - [`Timers`] — Phase deadlines as data, surviving restarts
//! - [`BotManager`] — Admin install/remove of the room bot
//! - [`recovery`] — Boot-time refund sweep for in-flight games
//!
//! ## Events
//!
//! - [`GameEvent`] — Domain events emitted to the [`Broadcaster`]
//! - [`Reply`] — Result object returned by every entry point
mod bot;
mod broadcast;
mod deck;
mod engine;
mod events;
mod game;
mod keys;
mod poller;
mod repository;
mod timer;

pub mod recovery;

pub use bot::*;
pub use broadcast::*;
pub use deck::*;
pub use engine::*;
pub use events::*;
pub use game::*;
pub use keys::*;
pub use poller::*;
pub use repository::*;
pub use timer::*;
