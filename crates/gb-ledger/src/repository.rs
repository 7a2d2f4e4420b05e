use super::record::CreditLog;
use async_trait::async_trait;
use gb_core::Coins;
use gb_core::ID;
use gb_core::User;
use gb_pg::DbError;
use gb_pg::Schema;
use gb_pg::USERS;
use std::sync::Arc;
use tokio_postgres::Client;

/// Durable-store operations behind the ledger.
///
/// Only the ledger may modify `users.credits`; everything else reads.
#[async_trait]
pub trait CreditRepository: Send + Sync {
    /// Decrement by `amount` only if `credits >= amount`. Returns the new
    /// balance, or None if the conditional update matched no row.
    async fn decrement_if_sufficient(
        &self,
        user: ID<User>,
        amount: Coins,
    ) -> Result<Option<Coins>, DbError>;
    /// Unconditional increment. Returns the new balance.
    async fn increment(&self, user: ID<User>, amount: Coins) -> Result<Coins, DbError>;
    async fn balance(&self, user: ID<User>) -> Result<Option<Coins>, DbError>;
    async fn append_log(&self, entry: &CreditLog) -> Result<(), DbError>;
}

#[async_trait]
impl CreditRepository for Arc<Client> {
    async fn decrement_if_sufficient(
        &self,
        user: ID<User>,
        amount: Coins,
    ) -> Result<Option<Coins>, DbError> {
        let row = self
            .query_opt(
                const_format::concatcp!(
                    "UPDATE ",
                    USERS,
                    " SET credits = credits - $2 WHERE id = $1 AND credits >= $2 RETURNING credits"
                ),
                &[&user.inner(), &amount],
            )
            .await?;
        Ok(row.map(|row| row.get::<_, Coins>(0)))
    }
    async fn increment(&self, user: ID<User>, amount: Coins) -> Result<Coins, DbError> {
        let row = self
            .query_opt(
                const_format::concatcp!(
                    "UPDATE ",
                    USERS,
                    " SET credits = credits + $2 WHERE id = $1 RETURNING credits"
                ),
                &[&user.inner(), &amount],
            )
            .await?;
        row.map(|row| row.get::<_, Coins>(0))
            .ok_or_else(|| DbError::msg(format!("no account for user {}", user)))
    }
    async fn balance(&self, user: ID<User>) -> Result<Option<Coins>, DbError> {
        let row = self
            .query_opt(
                const_format::concatcp!("SELECT credits FROM ", USERS, " WHERE id = $1"),
                &[&user.inner()],
            )
            .await?;
        Ok(row.map(|row| row.get::<_, Coins>(0)))
    }
    async fn append_log(&self, entry: &CreditLog) -> Result<(), DbError> {
        self.execute(
            const_format::concatcp!(
                "INSERT INTO ",
                gb_pg::CREDIT_LOGS,
                " (user_id, username, amount, transaction_type, description, at)",
                " VALUES ($1, $2, $3, $4, $5, $6)"
            ),
            &[
                &entry.user.inner(),
                &entry.username,
                &entry.amount,
                &entry.kind.to_string(),
                &entry.description,
                &entry.at,
            ],
        )
        .await
        .map(|_| ())
        .map_err(DbError::from)
    }
}

/// Chat user accounts. Ownership of rows is external (authentication is
/// not this engine's concern); the ledger only moves `credits`.
pub struct Accounts;

impl Schema for Accounts {
    fn name() -> &'static str {
        USERS
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            USERS,
            " (
                id       UUID PRIMARY KEY,
                username TEXT NOT NULL,
                role     TEXT NOT NULL DEFAULT 'user',
                credits  BIGINT NOT NULL DEFAULT 0
            );"
        )
    }
    fn indices() -> &'static str {
        ""
    }
}
