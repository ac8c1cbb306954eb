use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown provider: {0}")]
pub struct UnknownProvider(pub String);

/// The cash desks deposits and withdrawals are executed against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    XBet,
    Melbet,
    Mostbet,
    Betwiner,
    WinWin,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::XBet => "1xBet",
            Provider::Melbet => "Melbet",
            Provider::Mostbet => "Mostbet",
            Provider::Betwiner => "Betwiner",
            Provider::WinWin => "WinWinBet",
        }
    }

    /// Environment-variable-friendly name (`KASSA_PROVIDER_<KEY>_URL`).
    pub fn env_key(&self) -> &'static str {
        match self {
            Provider::XBet => "XBET",
            Provider::Melbet => "MELBET",
            Provider::Mostbet => "MOSTBET",
            Provider::Betwiner => "BETWINER",
            Provider::WinWin => "WINWIN",
        }
    }

    pub fn all() -> [Provider; 5] {
        [
            Provider::XBet,
            Provider::Melbet,
            Provider::Mostbet,
            Provider::Betwiner,
            Provider::WinWin,
        ]
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = UnknownProvider;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1xBet" => Ok(Provider::XBet),
            "Melbet" => Ok(Provider::Melbet),
            "Mostbet" => Ok(Provider::Mostbet),
            "Betwiner" => Ok(Provider::Betwiner),
            "WinWinBet" => Ok(Provider::WinWin),
            other => Err(UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown payment status: {0}")]
pub struct UnknownStatus(pub String);

/// Payment lifecycle. `Pending` is the only non-terminal state; a row may
/// move to exactly one of the terminal states and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Expired,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(self, PaymentStatus::Pending) && next.is_terminal()
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "expired" => Ok(PaymentStatus::Expired),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// Outcome of a status update against the ledger. `Applied` means the
/// calling invocation caused the transition; everything else is a no-op
/// observed after the fact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    /// The row moved from pending to the requested status just now.
    Applied,
    /// The row already held the requested status.
    AlreadySet,
    /// The row reached a different terminal status first; nothing changed.
    Superseded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Completed,
    Failed,
}

impl WithdrawalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Completed => "completed",
            WithdrawalStatus::Failed => "failed",
        }
    }
}

impl FromStr for WithdrawalStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "completed" => Ok(WithdrawalStatus::Completed),
            "failed" => Ok(WithdrawalStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub phone: Option<String>,
    pub first_name: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

/// A deposit request waiting to be reconciled against an inbound
/// payment-rail notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub user_id: i64,
    pub provider: Provider,
    pub player_id: String,
    /// User-requested amount plus the per-request salt.
    pub amount: Decimal,
    /// Unique correlation token shown to the payer.
    pub payment_id: String,
    pub card_last4: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Chat/message of the payment notice shown to the payer, kept so the
    /// inline keyboard can be removed once the payment settles.
    pub notice_chat_id: Option<i64>,
    pub notice_message_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Withdrawal {
    pub id: i64,
    pub user_id: i64,
    pub provider: Provider,
    pub player_id: String,
    pub card_number: String,
    pub code: String,
    /// Unknown until a provider lookup resolves it.
    pub amount: Option<Decimal>,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

/// Fields needed to insert a payment; the ledger fills in id, status and
/// timestamps.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: i64,
    pub provider: Provider,
    pub player_id: String,
    pub amount: Decimal,
    pub payment_id: String,
    pub card_last4: String,
}

#[derive(Debug, Clone)]
pub struct NewWithdrawal {
    pub user_id: i64,
    pub provider: Provider,
    pub player_id: String,
    pub card_number: String,
    pub code: String,
}

/// A collecting card in the active pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Card {
    pub id: i64,
    pub card_number: String,
    pub card_name: String,
    pub is_active: bool,
}

impl Card {
    pub fn last4(&self) -> &str {
        let n = self.card_number.len();
        &self.card_number[n.saturating_sub(4)..]
    }
}

/// What the parser extracted from one raw notification. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedNotification {
    pub amount: Decimal,
    pub card_last4: String,
    pub raw_message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for s in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Expired,
        ] {
            assert_eq!(s.as_str().parse::<PaymentStatus>().unwrap(), s);
        }
    }

    #[test]
    fn only_pending_transitions() {
        use PaymentStatus::*;
        assert!(Pending.can_transition_to(Completed));
        assert!(Pending.can_transition_to(Failed));
        assert!(Pending.can_transition_to(Expired));
        assert!(!Pending.can_transition_to(Pending));
        for terminal in [Completed, Failed, Expired] {
            for next in [Pending, Completed, Failed, Expired] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn provider_names_round_trip() {
        for p in Provider::all() {
            assert_eq!(p.as_str().parse::<Provider>().unwrap(), p);
        }
        assert!("Pinnacle".parse::<Provider>().is_err());
    }
}
