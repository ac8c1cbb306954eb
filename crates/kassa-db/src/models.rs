//! Row-to-domain mapping. SQLite stores amounts as TEXT (exact decimal
//! strings) and timestamps as `%Y-%m-%d %H:%M:%f` TEXT, which compares
//! lexicographically in the same order as chronologically.

use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use rusqlite::Row;
use rusqlite::types::Type;

use kassa_types::models::{Card, Payment, PaymentStatus, Provider, User, Withdrawal, WithdrawalStatus};

/// Timestamp layout used for every stored TEXT timestamp and for cutoff
/// parameters compared against them.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn parse_ts(s: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .map(|ndt| ndt.and_utc())
}

fn conversion_err(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

fn get_ts(row: &Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(&raw).ok_or_else(|| conversion_err(idx, format!("bad timestamp: {raw}")))
}

fn get_opt_ts(row: &Row, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    Ok(raw.as_deref().and_then(parse_ts))
}

fn get_decimal(row: &Row, idx: usize) -> rusqlite::Result<Decimal> {
    let raw: String = row.get(idx)?;
    Decimal::from_str(&raw).map_err(|e| conversion_err(idx, format!("bad amount {raw}: {e}")))
}

fn get_opt_decimal(row: &Row, idx: usize) -> rusqlite::Result<Option<Decimal>> {
    let raw: Option<String> = row.get(idx)?;
    match raw {
        None => Ok(None),
        Some(s) => Decimal::from_str(&s)
            .map(Some)
            .map_err(|e| conversion_err(idx, format!("bad amount {s}: {e}"))),
    }
}

/// Column list matching [`map_payment`]. The notice columns are selected
/// only when the schema has them.
pub(crate) const PAYMENT_COLS: &str =
    "id, user_id, provider, player_id, amount, payment_id, card_last4, status, created_at, updated_at";
pub(crate) const PAYMENT_NOTICE_COLS: &str = ", notice_chat_id, notice_message_id";

pub(crate) fn map_payment(row: &Row, with_notice: bool) -> rusqlite::Result<Payment> {
    let provider_raw: String = row.get(2)?;
    let status_raw: String = row.get(7)?;
    let (notice_chat_id, notice_message_id) = if with_notice {
        (row.get(10)?, row.get(11)?)
    } else {
        (None, None)
    };

    Ok(Payment {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: Provider::from_str(&provider_raw)
            .map_err(|e| conversion_err(2, e.to_string()))?,
        player_id: row.get(3)?,
        amount: get_decimal(row, 4)?,
        payment_id: row.get(5)?,
        card_last4: row.get(6)?,
        status: PaymentStatus::from_str(&status_raw)
            .map_err(|e| conversion_err(7, e.to_string()))?,
        created_at: get_ts(row, 8)?,
        updated_at: get_opt_ts(row, 9)?,
        notice_chat_id,
        notice_message_id,
    })
}

pub(crate) fn map_user(row: &Row) -> rusqlite::Result<User> {
    Ok(User {
        user_id: row.get(0)?,
        username: row.get(1)?,
        phone: row.get(2)?,
        first_name: row.get(3)?,
        is_admin: row.get::<_, i64>(4)? != 0,
        created_at: get_ts(row, 5)?,
    })
}

pub(crate) fn map_withdrawal(row: &Row) -> rusqlite::Result<Withdrawal> {
    let provider_raw: String = row.get(2)?;
    let status_raw: String = row.get(7)?;
    Ok(Withdrawal {
        id: row.get(0)?,
        user_id: row.get(1)?,
        provider: Provider::from_str(&provider_raw)
            .map_err(|e| conversion_err(2, e.to_string()))?,
        player_id: row.get(3)?,
        card_number: row.get(4)?,
        code: row.get(5)?,
        amount: get_opt_decimal(row, 6)?,
        status: WithdrawalStatus::from_str(&status_raw)
            .map_err(|e| conversion_err(7, e.to_string()))?,
        created_at: get_ts(row, 8)?,
    })
}

pub(crate) fn map_card(row: &Row) -> rusqlite::Result<Card> {
    Ok(Card {
        id: row.get(0)?,
        card_number: row.get(1)?,
        card_name: row.get(2)?,
        is_active: row.get::<_, i64>(3)? != 0,
    })
}
