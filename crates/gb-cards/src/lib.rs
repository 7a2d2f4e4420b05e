//! Card primitives for the chat-game engines.
//!
//! ## Core Types
//!
//! - [`Card`] — A single card as a `(Rank, Suit)` tuple encoded in one byte
//! - [`Rank`] — Two through Ace, compared by LowCard value (2..=14)
//! - [`Suit`] — Hearts, diamonds, clubs, spades
//! - [`Deck`] — An ordered, shuffled 52-card sequence drawn from the tail
//!
//! LowCard ordering is rank-only: Jack=11, Queen=12, King=13, Ace=14, and
//! suits never break ties. The deck is a plain ordered sequence so it can be
//! persisted externally and popped one card at a time.
mod card;
mod deck;
mod rank;
mod suit;

pub use card::*;
pub use deck::*;
pub use rank::*;
pub use suit::*;
