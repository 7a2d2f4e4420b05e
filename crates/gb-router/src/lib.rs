//! Chat command routing.
//!
//! Raw chat strings become typed [`Command`]s, the [`Router`] dispatches
//! them to the engine honoring per-room active-game affinity, and the
//! [`RoomSerializer`] drains pub/sub-delivered commands in FIFO order per
//! room so replicas never interleave a single room's traffic.
mod command;
mod router;
mod serializer;

pub use command::*;
pub use router::*;
pub use serializer::*;
