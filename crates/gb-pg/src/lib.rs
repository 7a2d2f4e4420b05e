//! PostgreSQL integration for the durable store.
//!
//! ## Connectivity
//!
//! - [`db()`] — Establishes a database connection from `DB_URL`
//!
//! ## Serialization
//!
//! - [`Schema`] — Table metadata and DDL generation
//! - [`DbError`] — Backend-agnostic error for repository traits
//!
//! ## Table Names
//!
//! Constants for all persistent entities: users, rooms, credit logs,
//! game history, and per-game records.

use std::sync::Arc;
use tokio_postgres::Client;

/// Establishes a database connection.
///
/// Connects to PostgreSQL using the `DB_URL` environment variable.
/// Returns an `Arc<Client>` suitable for sharing across async tasks.
///
/// # Panics
///
/// Panics if `DB_URL` is not set or if connection fails.
pub async fn db() -> Arc<Client> {
    log::info!("connecting to database");
    let tls = tokio_postgres::tls::NoTls;
    let ref url = std::env::var("DB_URL").expect("DB_URL must be set");
    let (client, connection) = tokio_postgres::connect(url, tls)
        .await
        .expect("database connection failed");
    tokio::spawn(connection);
    client
        .execute("SET client_min_messages TO WARNING", &[])
        .await
        .expect("set client_min_messages");
    Arc::new(client)
}

/// PostgreSQL error type alias.
pub type PgErr = tokio_postgres::Error;

/// Backend-agnostic durable-store error.
///
/// Repository traits return this so that the postgres implementations and
/// the in-memory fakes share one signature.
#[derive(Debug)]
pub struct DbError(String);

impl DbError {
    pub fn msg(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl From<PgErr> for DbError {
    fn from(e: PgErr) -> Self {
        Self(e.to_string())
    }
}

impl std::fmt::Display for DbError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "database error: {}", self.0)
    }
}

impl std::error::Error for DbError {}

/// Schema metadata for PostgreSQL tables.
///
/// Provides compile-time SQL generation for table creation and indexing.
/// All methods return `&'static str` to enable compile-time string
/// construction via [`const_format::concatcp!`].
///
/// This trait contains no I/O operations, it purely describes structure.
pub trait Schema {
    /// Returns the table name in the database.
    fn name() -> &'static str;
    /// Returns `CREATE TABLE IF NOT EXISTS` DDL statement.
    fn creates() -> &'static str;
    /// Returns `CREATE INDEX IF NOT EXISTS` statements for all indices.
    fn indices() -> &'static str;
    /// Executes the DDL for this table.
    #[allow(async_fn_in_trait)]
    async fn migrate(client: &Client) -> Result<(), PgErr> {
        log::debug!("[schema] ensuring table {}", Self::name());
        client.batch_execute(Self::creates()).await?;
        if !Self::indices().is_empty() {
            client.batch_execute(Self::indices()).await?;
        }
        Ok(())
    }
}

/// Table for chat user accounts and authoritative balances.
#[rustfmt::skip]
pub const USERS:           &str = "users";
/// Table for chat rooms.
#[rustfmt::skip]
pub const ROOMS:           &str = "rooms";
/// Table for per-room admin grants.
#[rustfmt::skip]
pub const ROOM_ADMINS:     &str = "room_admins";
/// Append-only ledger transaction log.
#[rustfmt::skip]
pub const CREDIT_LOGS:     &str = "credit_logs";
/// Per-player game outcome rows.
#[rustfmt::skip]
pub const GAME_HISTORY:    &str = "game_history";
/// Per-game LowCard records.
#[rustfmt::skip]
pub const LOWCARD_GAMES:   &str = "lowcard_games";
/// Per-game LowCard summaries written on finish.
#[rustfmt::skip]
pub const LOWCARD_HISTORY: &str = "lowcard_history";
/// Merchant tagging for commission payouts.
#[rustfmt::skip]
pub const MERCHANT_TAGS:   &str = "merchant_tags";
