//! Deposit request creation: salt the amount, pick a collecting card,
//! allocate a correlation token and persist the pending payment.

use rand::Rng;
use rand::seq::IndexedRandom;
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::info;

use kassa_db::Database;
use kassa_types::models::{NewPayment, Provider};

use crate::render;
use crate::validate;

/// Salt range added on top of the requested amount. Keeps two requests
/// for the same round sum distinguishable on the rail statement.
const SALT_MIN: i64 = 1;
const SALT_MAX: i64 = 125;

/// Attempts to find a free correlation token before giving up. The token
/// space is small by design (it is typed by humans), so collisions are
/// possible but cheap to retry.
const TOKEN_ATTEMPTS: u32 = 8;

pub const PAYMENT_WINDOW_SECS: u64 = 300;

#[derive(Debug, Error)]
pub enum DepositError {
    #[error("invalid player id")]
    InvalidPlayerId,
    #[error("amount out of range")]
    AmountOutOfRange,
    #[error("no active collecting cards")]
    NoActiveCards,
    #[error("could not allocate a correlation token")]
    TokenSpaceExhausted,
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

/// Everything the caller needs to show the payer a payment notice.
#[derive(Debug, Clone)]
pub struct CreatedDeposit {
    pub payment_id: String,
    pub provider: Provider,
    pub player_id: String,
    pub amount_to_pay: Decimal,
    pub requested_amount: Decimal,
    pub card_number: String,
    pub notice_text: String,
}

pub fn generate_payment_id() -> String {
    rand::rng().random_range(10_000..=99_999).to_string()
}

fn generate_salt() -> Decimal {
    Decimal::from(rand::rng().random_range(SALT_MIN..=SALT_MAX))
}

/// Create a pending payment for a user who finished the collection flow
/// (provider chosen, player id validated, amount validated upstream
/// against a live lookup). The caller renders/sends the notice and may
/// attach its message ids afterwards for later cleanup.
pub fn create_deposit_request(
    db: &Database,
    user_id: i64,
    provider: Provider,
    player_id: &str,
    amount: Decimal,
    limits: (Decimal, Decimal),
) -> Result<CreatedDeposit, DepositError> {
    if !validate::valid_player_id(player_id) {
        return Err(DepositError::InvalidPlayerId);
    }
    let (min, max) = limits;
    if amount < min || amount > max {
        return Err(DepositError::AmountOutOfRange);
    }

    let cards = db.active_cards()?;
    let card = cards
        .choose(&mut rand::rng())
        .ok_or(DepositError::NoActiveCards)?;

    let amount_to_pay = amount + generate_salt();

    for _ in 0..TOKEN_ATTEMPTS {
        let payment_id = generate_payment_id();
        let inserted = db.add_payment(&NewPayment {
            user_id,
            provider,
            player_id: player_id.trim().to_string(),
            amount: amount_to_pay,
            payment_id: payment_id.clone(),
            card_last4: card.last4().to_string(),
        })?;
        if !inserted {
            continue;
        }

        info!(
            "deposit request {} created: {} {} for user {}",
            payment_id, provider, amount_to_pay, user_id
        );
        let notice_text = render::payment_notice(
            provider,
            player_id,
            &card.card_number,
            amount_to_pay,
            amount,
            &payment_id,
            user_id,
        );
        return Ok(CreatedDeposit {
            payment_id,
            provider,
            player_id: player_id.trim().to_string(),
            amount_to_pay,
            requested_amount: amount,
            card_number: card.card_number.clone(),
            notice_text,
        });
    }

    Err(DepositError::TokenSpaceExhausted)
}
