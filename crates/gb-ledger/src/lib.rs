//! Durable COINS accounting.
//!
//! The ledger is the single source of truth for balances. Deducts are
//! conditional on sufficient funds, credits are unconditional, and every
//! movement appends to the `credit_logs` table. Balances are written
//! through to a cached copy in the keyed store.
//!
//! ## Components
//!
//! - [`Ledger`] — deduct / credit / cache-aside balance reads
//! - [`CreditRepository`] — durable-store operations, postgres or in-memory
//! - [`MerchantLedger`] — opaque merchant-tag hook (tagged credits, commission)
//! - [`CreditLog`] — append-only transaction record
mod ledger;
mod memory;
mod merchant;
mod record;
mod repository;

pub use ledger::*;
pub use memory::*;
pub use merchant::*;
pub use record::*;
pub use repository::*;
