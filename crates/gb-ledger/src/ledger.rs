use super::merchant::Consumption;
use super::merchant::MerchantLedger;
use super::record::CreditLog;
use super::record::TransactionType;
use super::repository::CreditRepository;
use gb_core::BALANCE_CACHE_TTL_SECS;
use gb_core::Coins;
use gb_core::ID;
use gb_core::User;
use gb_keyed::KeyedStore;
use gb_keyed::StoreError;
use gb_pg::DbError;
use std::sync::Arc;
use std::time::Duration;

/// Cached balance key for a user.
pub fn balance_key(user: ID<User>) -> String {
    format!("credits:{}", user)
}

/// Errors crossing the ledger boundary.
#[derive(Debug)]
pub enum LedgerError {
    Store(StoreError),
    Db(DbError),
}

impl std::fmt::Display for LedgerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store(e) => write!(f, "{}", e),
            Self::Db(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for LedgerError {}

impl From<StoreError> for LedgerError {
    fn from(e: StoreError) -> Self {
        Self::Store(e)
    }
}
impl From<DbError> for LedgerError {
    fn from(e: DbError) -> Self {
        Self::Db(e)
    }
}

/// Outcome of a deduct attempt. `success = false` means insufficient
/// funds; infrastructure faults surface as `Err(LedgerError)` instead.
#[derive(Debug, Clone, Copy)]
pub struct Debit {
    pub success: bool,
    pub balance: Coins,
    pub used_tagged: Coins,
}

/// Deduct/credit operations against the durable store, with write-through
/// to the cached balance in the keyed store and an append-only log.
///
/// Every engine error path routes back through [`Ledger::credit`]; no
/// deduct may lack a compensating refund path.
pub struct Ledger {
    repo: Arc<dyn CreditRepository>,
    merchants: Arc<dyn MerchantLedger>,
    cache: Arc<dyn KeyedStore>,
}

impl Ledger {
    pub fn new(
        repo: Arc<dyn CreditRepository>,
        merchants: Arc<dyn MerchantLedger>,
        cache: Arc<dyn KeyedStore>,
    ) -> Self {
        Self {
            repo,
            merchants,
            cache,
        }
    }

    /// Deduct `amount` for a bet, consuming tagged credits first.
    pub async fn deduct(
        &self,
        user: ID<User>,
        amount: Coins,
        username: &str,
        reason: &str,
        session: &str,
    ) -> Result<Debit, LedgerError> {
        let tagged = self.merchants.tagged_balance(user).await?;
        let consumption = match tagged > 0 {
            true => {
                self.merchants
                    .consume_for_game(user, "lowcard", amount, session)
                    .await?
            }
            false => Consumption::untouched(amount),
        };
        if consumption.remaining <= 0 {
            let description = format!("{} (Tagged Credits)", reason);
            self.append(user, username, amount, TransactionType::GameBet, &description)
                .await?;
            let balance = self.read_balance(user).await?;
            log::debug!("[ledger] {} bet {} fully tagged", username, amount);
            return Ok(Debit {
                success: true,
                balance,
                used_tagged: consumption.used_tagged,
            });
        }
        match self
            .repo
            .decrement_if_sufficient(user, consumption.remaining)
            .await?
        {
            Some(balance) => {
                self.write_cache(user, balance).await;
                self.append(
                    user,
                    username,
                    consumption.remaining,
                    TransactionType::GameBet,
                    reason,
                )
                .await?;
                log::debug!("[ledger] {} bet {} (balance {})", username, amount, balance);
                Ok(Debit {
                    success: true,
                    balance,
                    used_tagged: consumption.used_tagged,
                })
            }
            None => {
                let balance = self.read_balance(user).await.unwrap_or(0);
                Ok(Debit {
                    success: false,
                    balance,
                    used_tagged: 0,
                })
            }
        }
    }

    /// Unconditional credit, logged as a refund when the reason says so.
    pub async fn credit(
        &self,
        user: ID<User>,
        amount: Coins,
        username: &str,
        reason: &str,
    ) -> Result<Coins, LedgerError> {
        let balance = self.repo.increment(user, amount).await?;
        self.write_cache(user, balance).await;
        let kind = match reason.contains("Refund") {
            true => TransactionType::GameRefund,
            false => TransactionType::GameWin,
        };
        self.append(user, username, amount, kind, reason).await?;
        log::debug!(
            "[ledger] {} credited {} (balance {})",
            username,
            amount,
            balance
        );
        Ok(balance)
    }

    /// Cache-aside balance read.
    pub async fn read_balance(&self, user: ID<User>) -> Result<Coins, LedgerError> {
        let key = balance_key(user);
        if let Some(cached) = self.cache.get(&key).await? {
            if let Ok(balance) = cached.parse::<Coins>() {
                return Ok(balance);
            }
        }
        let balance = self.repo.balance(user).await?.unwrap_or(0);
        self.write_cache(user, balance).await;
        Ok(balance)
    }

    /// Drop the cached balance; the next read goes to the durable store.
    pub async fn invalidate(&self, user: ID<User>) {
        if let Err(e) = self.cache.del(&balance_key(user)).await {
            log::warn!("[ledger] cache invalidation failed for {}: {}", user, e);
        }
    }

    /// The merchant with an active tag on this user, if any.
    pub async fn active_merchant(
        &self,
        user: ID<User>,
    ) -> Result<Option<ID<User>>, LedgerError> {
        Ok(self.merchants.active_merchant(user).await?)
    }

    async fn append(
        &self,
        user: ID<User>,
        username: &str,
        amount: Coins,
        kind: TransactionType,
        description: &str,
    ) -> Result<(), LedgerError> {
        let entry = CreditLog::new(user, username, amount, kind, description);
        Ok(self.repo.append_log(&entry).await?)
    }

    async fn write_cache(&self, user: ID<User>, balance: Coins) {
        let key = balance_key(user);
        let ttl = Duration::from_secs(BALANCE_CACHE_TTL_SECS);
        if let Err(e) = self.cache.set(&key, &balance.to_string(), ttl).await {
            log::warn!("[ledger] cache write failed for {}: {}", user, e);
        }
    }
}
