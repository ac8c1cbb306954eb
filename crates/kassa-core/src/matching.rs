use anyhow::Result;
use rust_decimal::Decimal;

use kassa_db::Database;
use kassa_types::models::{ParsedNotification, Payment};

/// Resolve a parsed notification to the pending payment it settles.
///
/// The suffix must match exactly; the amount must be within `tolerance`,
/// which defaults to zero everywhere because salted amounts are unique by
/// construction. Among several candidates the most recently created row
/// wins — the ledger returns them newest-first.
pub fn find_match(
    db: &Database,
    parsed: &ParsedNotification,
    tolerance: Decimal,
) -> Result<Option<Payment>> {
    let candidates =
        db.find_pending_by_card_and_amount(&parsed.card_last4, parsed.amount, tolerance)?;
    Ok(candidates.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use rust_decimal_macros::dec;

    use kassa_db::models::format_ts;
    use kassa_types::models::{NewPayment, Provider};

    fn note(amount: Decimal, last4: &str) -> ParsedNotification {
        ParsedNotification {
            amount,
            card_last4: last4.to_string(),
            raw_message: String::new(),
        }
    }

    fn seed(db: &Database, payment_id: &str, amount: Decimal, age_secs: i64) {
        db.add_payment(&NewPayment {
            user_id: 1,
            provider: Provider::XBet,
            player_id: "player01".into(),
            amount,
            payment_id: payment_id.into(),
            card_last4: "8012".into(),
        })
        .unwrap();
        let ts = Utc::now() - Duration::seconds(age_secs);
        db.with_conn(|conn| {
            conn.execute(
                "UPDATE payments SET created_at = ?1 WHERE payment_id = ?2",
                rusqlite::params![format_ts(ts), payment_id],
            )?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn picks_the_newer_of_two_identical_candidates() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user(1, None, None).unwrap();
        seed(&db, "11111", dec!(50125), 120);
        seed(&db, "22222", dec!(50125), 5);

        let hit = find_match(&db, &note(dec!(50125), "8012"), Decimal::ZERO)
            .unwrap()
            .unwrap();
        assert_eq!(hit.payment_id, "22222");
    }

    #[test]
    fn no_candidate_is_a_clean_miss() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user(1, None, None).unwrap();
        seed(&db, "11111", dec!(50125), 5);

        assert!(find_match(&db, &note(dec!(50125), "9999"), Decimal::ZERO)
            .unwrap()
            .is_none());
        assert!(find_match(&db, &note(dec!(99), "8012"), Decimal::ZERO)
            .unwrap()
            .is_none());
    }
}
