use async_trait::async_trait;
use gb_core::Coins;
use gb_core::ID;
use gb_core::User;
use gb_pg::DbError;
use gb_pg::MERCHANT_TAGS;
use gb_pg::Schema;
use std::sync::Arc;
use tokio_postgres::Client;

/// Result of consuming tagged credits for a bet.
#[derive(Debug, Clone, Copy)]
pub struct Consumption {
    pub success: bool,
    pub used_tagged: Coins,
    /// Portion of the bet still owed from the regular balance.
    pub remaining: Coins,
}

impl Consumption {
    /// Nothing tagged was consumed; the whole amount comes from balance.
    pub fn untouched(amount: Coins) -> Self {
        Self {
            success: true,
            used_tagged: 0,
            remaining: amount,
        }
    }
}

/// Merchant-tag hook.
///
/// Tagged credits are issued by a merchant and consumed preferentially over
/// the regular balance during a bet; the merchant earns a commission from
/// the house fee of games their tagged users start. The accounting behind
/// the tagged pool is an external collaborator, specified only where the
/// ledger touches it.
#[async_trait]
pub trait MerchantLedger: Send + Sync {
    /// Tagged-credit balance available to this user.
    async fn tagged_balance(&self, user: ID<User>) -> Result<Coins, DbError>;
    /// Consume up to `amount` tagged credits for a game bet.
    async fn consume_for_game(
        &self,
        user: ID<User>,
        game: &str,
        amount: Coins,
        session: &str,
    ) -> Result<Consumption, DbError>;
    /// The merchant with an active tag on this user, if any.
    async fn active_merchant(&self, user: ID<User>) -> Result<Option<ID<User>>, DbError>;
}

/// Merchant-tag hook with no tagged-credit pool.
///
/// Single-tenant deployments run with this; every bet comes entirely from
/// the regular balance and no commission is ever due.
pub struct NoMerchants;

#[async_trait]
impl MerchantLedger for NoMerchants {
    async fn tagged_balance(&self, _user: ID<User>) -> Result<Coins, DbError> {
        Ok(0)
    }
    async fn consume_for_game(
        &self,
        _user: ID<User>,
        _game: &str,
        amount: Coins,
        _session: &str,
    ) -> Result<Consumption, DbError> {
        Ok(Consumption::untouched(amount))
    }
    async fn active_merchant(&self, _user: ID<User>) -> Result<Option<ID<User>>, DbError> {
        Ok(None)
    }
}

/// Merchant tags read from the durable store. The tagged-credit pool
/// itself lives with the external merchant subsystem, so only the tag
/// lookup is answered here; consumption passes through untouched.
pub struct PgMerchants {
    db: Arc<Client>,
}

impl PgMerchants {
    pub fn new(db: Arc<Client>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl MerchantLedger for PgMerchants {
    async fn tagged_balance(&self, _user: ID<User>) -> Result<Coins, DbError> {
        Ok(0)
    }
    async fn consume_for_game(
        &self,
        _user: ID<User>,
        _game: &str,
        amount: Coins,
        _session: &str,
    ) -> Result<Consumption, DbError> {
        Ok(Consumption::untouched(amount))
    }
    async fn active_merchant(&self, user: ID<User>) -> Result<Option<ID<User>>, DbError> {
        let row = self
            .db
            .query_opt(
                const_format::concatcp!(
                    "SELECT merchant_id FROM ",
                    MERCHANT_TAGS,
                    " WHERE tagged_user_id = $1 AND status = 'active'"
                ),
                &[&user.inner()],
            )
            .await?;
        Ok(row.map(|row| ID::from(row.get::<_, uuid::Uuid>(0))))
    }
}

/// Merchant tag row marker for DDL.
pub struct MerchantTag;

impl Schema for MerchantTag {
    fn name() -> &'static str {
        MERCHANT_TAGS
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            MERCHANT_TAGS,
            " (
                merchant_id    UUID NOT NULL,
                tagged_user_id UUID NOT NULL,
                status         TEXT NOT NULL,
                PRIMARY KEY (merchant_id, tagged_user_id)
            );"
        )
    }
    fn indices() -> &'static str {
        const_format::concatcp!(
            "CREATE INDEX IF NOT EXISTS merchant_tags_user_idx ON ",
            MERCHANT_TAGS,
            " (tagged_user_id);"
        )
    }
}
