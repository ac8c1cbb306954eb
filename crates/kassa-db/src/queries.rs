use anyhow::{Result, bail};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::debug;

use kassa_types::models::{
    Card, NewPayment, NewWithdrawal, Payment, PaymentStatus, StatusChange, User, Withdrawal,
    WithdrawalStatus,
};

use crate::Database;
use crate::models::{
    PAYMENT_COLS, PAYMENT_NOTICE_COLS, format_ts, map_card, map_payment, map_user, map_withdrawal,
};

/// How many match candidates a card/amount lookup may return. Salts make
/// collisions rare, so a small bound is enough.
const MATCH_LIMIT: usize = 10;

fn is_unique_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

impl Database {
    // -- Users --

    /// Insert the user on first contact; on later contacts refresh the
    /// username/display name but never touch phone or the admin flag.
    pub fn ensure_user(
        &self,
        user_id: i64,
        username: Option<&str>,
        first_name: Option<&str>,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (user_id, username, first_name) VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id) DO UPDATE SET
                     username = COALESCE(excluded.username, users.username),
                     first_name = COALESCE(excluded.first_name, users.first_name)",
                params![user_id, username, first_name],
            )?;
            Ok(())
        })
    }

    pub fn set_phone(&self, user_id: i64, phone: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed =
                conn.execute("UPDATE users SET phone = ?1 WHERE user_id = ?2", params![phone, user_id])?;
            Ok(changed > 0)
        })
    }

    pub fn get_user(&self, user_id: i64) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let user = conn
                .query_row(
                    "SELECT user_id, username, phone, first_name, is_admin, created_at
                     FROM users WHERE user_id = ?1",
                    [user_id],
                    map_user,
                )
                .optional()?;
            Ok(user)
        })
    }

    pub fn count_users(&self) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?;
            Ok(n as u64)
        })
    }

    // -- Payments --

    /// Insert a pending payment. Returns `false` when the correlation
    /// token is already taken; the row is never partially written.
    pub fn add_payment(&self, new: &NewPayment) -> Result<bool> {
        self.with_conn(|conn| {
            let res = conn.execute(
                "INSERT INTO payments (user_id, provider, player_id, amount, payment_id, card_last4)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    new.user_id,
                    new.provider.as_str(),
                    new.player_id,
                    new.amount.to_string(),
                    new.payment_id,
                    new.card_last4,
                ],
            );
            match res {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>> {
        let with_notice = self.notice_columns();
        self.with_conn(|conn| {
            let sql = payment_select(with_notice, "WHERE payment_id = ?1");
            let payment = conn
                .query_row(&sql, [payment_id], |row| map_payment(row, with_notice))
                .optional()?;
            Ok(payment)
        })
    }

    /// The gating transition. A single compare-and-set from `pending`
    /// decides which of several concurrent callers caused the change:
    /// only that caller sees [`StatusChange::Applied`]. Re-applying a
    /// status the row already holds is a no-op, and a row that reached a
    /// different terminal status first is left untouched. Moving back to
    /// `pending` is refused outright.
    pub fn update_payment_status(
        &self,
        payment_id: &str,
        status: PaymentStatus,
    ) -> Result<StatusChange> {
        if !status.is_terminal() {
            bail!("payments cannot return to pending");
        }
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE payments
                 SET status = ?1, updated_at = strftime('%Y-%m-%d %H:%M:%f','now')
                 WHERE payment_id = ?2 AND status = 'pending'",
                params![status.as_str(), payment_id],
            )?;
            if changed == 1 {
                return Ok(StatusChange::Applied);
            }

            let current: Option<String> = conn
                .query_row(
                    "SELECT status FROM payments WHERE payment_id = ?1",
                    [payment_id],
                    |r| r.get(0),
                )
                .optional()?;
            match current {
                None => bail!("unknown payment {payment_id}"),
                Some(s) if s == status.as_str() => Ok(StatusChange::AlreadySet),
                Some(_) => Ok(StatusChange::Superseded),
            }
        })
    }

    /// Compensation for a credit call that was lost after the gate:
    /// completed -> failed, nothing else. Only the reconciler invocation
    /// that won the gate may issue this.
    pub fn mark_credit_failed(&self, payment_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE payments
                 SET status = 'failed', updated_at = strftime('%Y-%m-%d %H:%M:%f','now')
                 WHERE payment_id = ?1 AND status = 'completed'",
                [payment_id],
            )?;
            Ok(changed == 1)
        })
    }

    /// Remember where the payment notice was shown so its keyboard can be
    /// removed later. Returns `false` (feature unavailable) on schemas
    /// without the notice columns.
    pub fn set_payment_notice(
        &self,
        payment_id: &str,
        chat_id: i64,
        message_id: i64,
    ) -> Result<bool> {
        if !self.notice_columns() {
            return Ok(false);
        }
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE payments SET notice_chat_id = ?1, notice_message_id = ?2
                 WHERE payment_id = ?3",
                params![chat_id, message_id, payment_id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Pending payments whose card suffix matches exactly and whose amount
    /// is within `tolerance`, newest first, capped at a small count.
    pub fn find_pending_by_card_and_amount(
        &self,
        card_last4: &str,
        amount: Decimal,
        tolerance: Decimal,
    ) -> Result<Vec<Payment>> {
        let with_notice = self.notice_columns();
        self.with_conn(|conn| {
            let sql = payment_select(
                with_notice,
                "WHERE status = 'pending' AND card_last4 = ?1
                 ORDER BY created_at DESC, id DESC",
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([card_last4], |row| map_payment(row, with_notice))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .filter(|p| (p.amount - amount).abs() <= tolerance)
                .take(MATCH_LIMIT)
                .collect())
        })
    }

    /// Bulk-expire pending payments created before `cutoff`. Returns how
    /// many rows were transitioned.
    pub fn expire_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE payments
                 SET status = 'expired', updated_at = strftime('%Y-%m-%d %H:%M:%f','now')
                 WHERE status = 'pending' AND created_at < ?1",
                [format_ts(cutoff)],
            )?;
            debug!("expired {} pending payments", changed);
            Ok(changed as u64)
        })
    }

    pub fn count_payments_by_status(&self, status: PaymentStatus) -> Result<u64> {
        self.with_conn(|conn| {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM payments WHERE status = ?1",
                [status.as_str()],
                |r| r.get(0),
            )?;
            Ok(n as u64)
        })
    }

    /// Sum of today's completed payments. Amounts are summed in decimal
    /// on this side of the connection; the aggregate does not need to be
    /// linearizable with concurrent writers.
    pub fn sum_completed_today(&self) -> Result<Decimal> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT amount FROM payments
                 WHERE status = 'completed' AND DATE(created_at) = DATE('now')",
            )?;
            let amounts = stmt
                .query_map([], |r| r.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let mut total = Decimal::ZERO;
            for raw in amounts {
                total += raw.parse::<Decimal>().unwrap_or(Decimal::ZERO);
            }
            Ok(total)
        })
    }

    // -- Withdrawals --

    pub fn add_withdrawal(&self, new: &NewWithdrawal) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO withdrawals (user_id, provider, player_id, card_number, code)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    new.user_id,
                    new.provider.as_str(),
                    new.player_id,
                    new.card_number,
                    new.code,
                ],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_withdrawal(&self, id: i64) -> Result<Option<Withdrawal>> {
        self.with_conn(|conn| {
            let w = conn
                .query_row(
                    "SELECT id, user_id, provider, player_id, card_number, code, amount, status, created_at
                     FROM withdrawals WHERE id = ?1",
                    [id],
                    map_withdrawal,
                )
                .optional()?;
            Ok(w)
        })
    }

    pub fn pending_withdrawals(&self) -> Result<Vec<Withdrawal>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, user_id, provider, player_id, card_number, code, amount, status, created_at
                 FROM withdrawals WHERE status = 'pending' ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([], map_withdrawal)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn update_withdrawal_status(&self, id: i64, status: WithdrawalStatus) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE withdrawals SET status = ?1 WHERE id = ?2",
                params![status.as_str(), id],
            )?;
            Ok(changed > 0)
        })
    }

    /// Record the amount once a provider lookup has resolved it.
    pub fn set_withdrawal_amount(&self, id: i64, amount: Decimal) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE withdrawals SET amount = ?1 WHERE id = ?2",
                params![amount.to_string(), id],
            )?;
            Ok(changed > 0)
        })
    }

    // -- Cards --

    /// Add a collecting card. Returns `false` when the number is already
    /// in the pool.
    pub fn add_card(&self, card_number: &str, card_name: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let res = conn.execute(
                "INSERT INTO cards (card_number, card_name) VALUES (?1, ?2)",
                params![card_number, card_name],
            );
            match res {
                Ok(_) => Ok(true),
                Err(e) if is_unique_violation(&e) => Ok(false),
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn active_cards(&self) -> Result<Vec<Card>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, card_number, card_name, is_active FROM cards WHERE is_active = 1",
            )?;
            let rows = stmt
                .query_map([], map_card)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn all_cards(&self) -> Result<Vec<Card>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, card_number, card_name, is_active FROM cards")?;
            let rows = stmt
                .query_map([], map_card)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn remove_card(&self, card_number: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed =
                conn.execute("DELETE FROM cards WHERE card_number = ?1", [card_number])?;
            Ok(changed > 0)
        })
    }

    pub fn toggle_card(&self, card_number: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE cards SET is_active = NOT is_active WHERE card_number = ?1",
                [card_number],
            )?;
            Ok(changed > 0)
        })
    }
}

fn payment_select(with_notice: bool, tail: &str) -> String {
    if with_notice {
        format!("SELECT {PAYMENT_COLS}{PAYMENT_NOTICE_COLS} FROM payments {tail}")
    } else {
        format!("SELECT {PAYMENT_COLS} FROM payments {tail}")
    }
}
