use gb_core::Coins;
use gb_core::EpochMs;
use gb_core::ID;
use gb_core::User;
use gb_pg::CREDIT_LOGS;
use gb_pg::Schema;
use serde::Deserialize;
use serde::Serialize;

/// Ledger transaction classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    GameBet,
    GameWin,
    GameRefund,
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GameBet => write!(f, "game_bet"),
            Self::GameWin => write!(f, "game_win"),
            Self::GameRefund => write!(f, "game_refund"),
        }
    }
}

impl TryFrom<&str> for TransactionType {
    type Error = String;
    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s {
            "game_bet" => Ok(Self::GameBet),
            "game_win" => Ok(Self::GameWin),
            "game_refund" => Ok(Self::GameRefund),
            _ => Err(format!("unknown transaction type: {}", s)),
        }
    }
}

/// One append-only ledger line. Amounts are positive magnitudes; the
/// transaction type carries the direction.
#[derive(Debug, Clone)]
pub struct CreditLog {
    pub user: ID<User>,
    pub username: String,
    pub amount: Coins,
    pub kind: TransactionType,
    pub description: String,
    pub at: EpochMs,
}

impl CreditLog {
    pub fn new(
        user: ID<User>,
        username: &str,
        amount: Coins,
        kind: TransactionType,
        description: &str,
    ) -> Self {
        Self {
            user,
            username: username.to_string(),
            amount,
            kind,
            description: description.to_string(),
            at: gb_core::now_ms(),
        }
    }
}

impl Schema for CreditLog {
    fn name() -> &'static str {
        CREDIT_LOGS
    }
    fn creates() -> &'static str {
        const_format::concatcp!(
            "CREATE TABLE IF NOT EXISTS ",
            CREDIT_LOGS,
            " (
                id               BIGSERIAL PRIMARY KEY,
                user_id          UUID NOT NULL,
                username         TEXT NOT NULL,
                amount           BIGINT NOT NULL,
                transaction_type TEXT NOT NULL,
                description      TEXT NOT NULL,
                at               BIGINT NOT NULL
            );"
        )
    }
    fn indices() -> &'static str {
        const_format::concatcp!(
            "CREATE INDEX IF NOT EXISTS credit_logs_user_idx ON ",
            CREDIT_LOGS,
            " (user_id);"
        )
    }
}
