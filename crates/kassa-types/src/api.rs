use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Provider;

// -- Relay webhook --

#[derive(Debug, Deserialize)]
pub struct RelayNotification {
    pub text: String,
}

// -- Users --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetPhoneRequest {
    pub phone: String,
}

// -- Deposit requests --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDepositRequest {
    pub user_id: i64,
    pub provider: Provider,
    pub player_id: String,
    pub amount: Decimal,
}

#[derive(Debug, Serialize)]
pub struct DepositCreated {
    pub payment_id: String,
    pub provider: Provider,
    pub player_id: String,
    /// The exact amount the payer must transfer (salt included).
    pub amount_to_pay: Decimal,
    /// The amount the user asked for; transferring this instead will not
    /// reconcile.
    pub requested_amount: Decimal,
    pub card_number: String,
    pub expires_in_secs: u64,
    pub notice_text: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AttachNoticeRequest {
    pub chat_id: i64,
    pub message_id: i64,
}

// -- Manual deposit (operator path) --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualStartRequest {
    pub operator_id: i64,
    pub provider: Provider,
}

#[derive(Debug, Serialize)]
pub struct ManualSessionToken {
    pub token: Uuid,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualPlayerRequest {
    pub operator_id: i64,
    pub player_id: String,
}

#[derive(Debug, Serialize)]
pub struct ManualPlayerAccepted {
    pub player_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualAmountRequest {
    pub operator_id: i64,
    pub amount: String,
}

#[derive(Debug, Serialize)]
pub struct ManualSummary {
    pub provider: Provider,
    pub player_id: String,
    pub player_name: String,
    pub amount: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ManualDecisionRequest {
    pub operator_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ManualOutcome {
    pub success: bool,
    pub reason: Option<String>,
}

// -- Balances --

#[derive(Debug, Deserialize, Default)]
pub struct BalanceRequest {
    #[serde(default)]
    pub refresh: bool,
}

// -- Withdrawals --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateWithdrawalRequest {
    pub user_id: i64,
    pub provider: Provider,
    pub player_id: String,
    pub card_number: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct WithdrawalCreated {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CompleteWithdrawalRequest {
    /// Resolved by the operator via a provider lookup; may still be
    /// unknown when the desk could not answer.
    #[serde(default)]
    pub amount: Option<Decimal>,
}

// -- Reporting --

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub users: u64,
    pub pending_payments: u64,
    pub completed_payments: u64,
    pub completed_today: Decimal,
}
