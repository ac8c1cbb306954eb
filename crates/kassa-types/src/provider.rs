use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Result of a player lookup on a cash desk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PlayerLookupResult {
    Found { player_id: String, name: String },
    NotFound { reason: String },
    Unavailable { reason: String },
}

impl PlayerLookupResult {
    pub fn is_found(&self) -> bool {
        matches!(self, PlayerLookupResult::Found { .. })
    }
}

/// Result of a one-shot credit call. A `Failure` is terminal for the
/// attempt; callers must not resubmit on their own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CreditResult {
    Success,
    Failure { reason: String },
}

impl CreditResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CreditResult::Success)
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            CreditResult::Success => None,
            CreditResult::Failure { reason } => Some(reason),
        }
    }
}

/// Result of a cash-desk balance read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum BalanceResult {
    Available { balance: Decimal, limit: Decimal },
    Unavailable { reason: String },
}

impl BalanceResult {
    pub fn is_available(&self) -> bool {
        matches!(self, BalanceResult::Available { .. })
    }
}
