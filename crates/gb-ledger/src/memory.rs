use super::merchant::Consumption;
use super::merchant::MerchantLedger;
use super::record::CreditLog;
use super::repository::CreditRepository;
use async_trait::async_trait;
use gb_core::Coins;
use gb_core::ID;
use gb_core::User;
use gb_pg::DbError;
use std::collections::HashMap;
use std::sync::Mutex;

/// In-memory account table for tests and single-node runs.
#[derive(Default)]
pub struct MemoryCredits {
    balances: Mutex<HashMap<ID<User>, Coins>>,
    logs: Mutex<Vec<CreditLog>>,
}

impl MemoryCredits {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_balance(self, user: ID<User>, amount: Coins) -> Self {
        self.balances.lock().expect("balances").insert(user, amount);
        self
    }
    pub fn balance_of(&self, user: ID<User>) -> Coins {
        self.balances
            .lock()
            .expect("balances")
            .get(&user)
            .copied()
            .unwrap_or(0)
    }
    pub fn logs(&self) -> Vec<CreditLog> {
        self.logs.lock().expect("logs").clone()
    }
}

#[async_trait]
impl CreditRepository for MemoryCredits {
    async fn decrement_if_sufficient(
        &self,
        user: ID<User>,
        amount: Coins,
    ) -> Result<Option<Coins>, DbError> {
        let mut balances = self.balances.lock().expect("balances");
        match balances.get_mut(&user) {
            Some(credits) if *credits >= amount => {
                *credits -= amount;
                Ok(Some(*credits))
            }
            _ => Ok(None),
        }
    }
    async fn increment(&self, user: ID<User>, amount: Coins) -> Result<Coins, DbError> {
        let mut balances = self.balances.lock().expect("balances");
        let credits = balances.entry(user).or_insert(0);
        *credits += amount;
        Ok(*credits)
    }
    async fn balance(&self, user: ID<User>) -> Result<Option<Coins>, DbError> {
        Ok(self.balances.lock().expect("balances").get(&user).copied())
    }
    async fn append_log(&self, entry: &CreditLog) -> Result<(), DbError> {
        self.logs.lock().expect("logs").push(entry.clone());
        Ok(())
    }
}

/// Fixed merchant-tag assignments for tests.
#[derive(Default)]
pub struct StaticMerchants {
    tagged: Mutex<HashMap<ID<User>, Coins>>,
    merchant_of: HashMap<ID<User>, ID<User>>,
}

impl StaticMerchants {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_tagged(self, user: ID<User>, amount: Coins) -> Self {
        self.tagged.lock().expect("tagged").insert(user, amount);
        self
    }
    pub fn with_merchant(mut self, user: ID<User>, merchant: ID<User>) -> Self {
        self.merchant_of.insert(user, merchant);
        self
    }
}

#[async_trait]
impl MerchantLedger for StaticMerchants {
    async fn tagged_balance(&self, user: ID<User>) -> Result<Coins, DbError> {
        Ok(self
            .tagged
            .lock()
            .expect("tagged")
            .get(&user)
            .copied()
            .unwrap_or(0))
    }
    async fn consume_for_game(
        &self,
        user: ID<User>,
        _game: &str,
        amount: Coins,
        _session: &str,
    ) -> Result<Consumption, DbError> {
        let mut tagged = self.tagged.lock().expect("tagged");
        let available = tagged.get(&user).copied().unwrap_or(0);
        let used = available.min(amount);
        if used > 0 {
            tagged.insert(user, available - used);
        }
        Ok(Consumption {
            success: true,
            used_tagged: used,
            remaining: amount - used,
        })
    }
    async fn active_merchant(&self, user: ID<User>) -> Result<Option<ID<User>>, DbError> {
        Ok(self.merchant_of.get(&user).copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Ledger;
    use crate::NoMerchants;
    use crate::TransactionType;
    use gb_keyed::MemoryStore;
    use std::sync::Arc;

    fn ledger_with(balance: Coins) -> (Ledger, Arc<MemoryCredits>, ID<User>) {
        let user: ID<User> = ID::default();
        let repo = Arc::new(MemoryCredits::new().with_balance(user, balance));
        let ledger = Ledger::new(
            repo.clone(),
            Arc::new(NoMerchants),
            Arc::new(MemoryStore::new()),
        );
        (ledger, repo, user)
    }

    #[tokio::test]
    async fn deduct_decrements_and_logs() {
        let (ledger, repo, user) = ledger_with(100);
        let debit = ledger
            .deduct(user, 30, "alice", "LowCard Entry", "s1")
            .await
            .unwrap();
        assert!(debit.success);
        assert_eq!(debit.balance, 70);
        assert_eq!(repo.balance_of(user), 70);
        let logs = repo.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].kind, TransactionType::GameBet);
        assert_eq!(logs[0].amount, 30);
    }

    #[tokio::test]
    async fn deduct_insufficient_fails_without_log() {
        let (ledger, repo, user) = ledger_with(10);
        let debit = ledger
            .deduct(user, 30, "alice", "LowCard Entry", "s1")
            .await
            .unwrap();
        assert!(!debit.success);
        assert_eq!(repo.balance_of(user), 10);
        assert!(repo.logs().is_empty());
    }

    #[tokio::test]
    async fn credit_classifies_refund_by_reason() {
        let (ledger, repo, user) = ledger_with(0);
        ledger
            .credit(user, 25, "alice", "LowCard Refund - Game Cancelled")
            .await
            .unwrap();
        ledger.credit(user, 90, "alice", "LowCard Win").await.unwrap();
        let logs = repo.logs();
        assert_eq!(logs[0].kind, TransactionType::GameRefund);
        assert_eq!(logs[1].kind, TransactionType::GameWin);
        assert_eq!(repo.balance_of(user), 115);
    }

    #[tokio::test]
    async fn tagged_credits_consumed_first() {
        let user: ID<User> = ID::default();
        let repo = Arc::new(MemoryCredits::new().with_balance(user, 100));
        let merchants = Arc::new(StaticMerchants::new().with_tagged(user, 20));
        let ledger = Ledger::new(repo.clone(), merchants, Arc::new(MemoryStore::new()));
        // 20 tagged + 10 cash
        let debit = ledger
            .deduct(user, 30, "alice", "LowCard Entry", "s1")
            .await
            .unwrap();
        assert!(debit.success);
        assert_eq!(debit.used_tagged, 20);
        assert_eq!(repo.balance_of(user), 90);
    }

    #[tokio::test]
    async fn fully_tagged_bet_leaves_balance_alone() {
        let user: ID<User> = ID::default();
        let repo = Arc::new(MemoryCredits::new().with_balance(user, 100));
        let merchants = Arc::new(StaticMerchants::new().with_tagged(user, 50));
        let ledger = Ledger::new(repo.clone(), merchants, Arc::new(MemoryStore::new()));
        let debit = ledger
            .deduct(user, 30, "alice", "LowCard Entry", "s1")
            .await
            .unwrap();
        assert!(debit.success);
        assert_eq!(debit.used_tagged, 30);
        assert_eq!(repo.balance_of(user), 100);
        assert!(repo.logs()[0].description.contains("(Tagged Credits)"));
    }

    #[tokio::test]
    async fn read_balance_caches_and_invalidates() {
        let (ledger, repo, user) = ledger_with(40);
        assert_eq!(ledger.read_balance(user).await.unwrap(), 40);
        // A direct repo change is invisible until the cache is dropped.
        repo.increment(user, 10).await.unwrap();
        assert_eq!(ledger.read_balance(user).await.unwrap(), 40);
        ledger.invalidate(user).await;
        assert_eq!(ledger.read_balance(user).await.unwrap(), 50);
    }
}
