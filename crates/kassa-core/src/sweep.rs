//! Expiry sweeper: unpaid requests older than the retention window are
//! bulk-moved to `expired` so they can never match a late notification.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{error, info};

use kassa_db::Database;

pub const DEFAULT_RETENTION: Duration = Duration::from_secs(300);
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(60);

/// One sweep. Returns how many rows were expired; nothing is sent per
/// expired row.
pub fn run_once(db: &Database, retention: Duration) -> Result<u64> {
    let cutoff = Utc::now() - chrono::Duration::seconds(retention.as_secs() as i64);
    db.expire_older_than(cutoff)
}

/// Periodic sweeping from the server bootstrap.
pub fn start(db: Arc<Database>, retention: Duration, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick fires immediately; skip it so a restart does not
        // race payments created moments before shutdown.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match run_once(&db, retention) {
                Ok(0) => {}
                Ok(n) => info!("expired {} stale payment requests", n),
                Err(e) => error!("expiry sweep failed: {:#}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use rust_decimal_macros::dec;

    use kassa_db::models::format_ts;
    use kassa_types::models::{NewPayment, PaymentStatus, Provider};

    fn seed(db: &Database, payment_id: &str, age_secs: i64) {
        db.add_payment(&NewPayment {
            user_id: 1,
            provider: Provider::XBet,
            player_id: "player01".into(),
            amount: dec!(50125),
            payment_id: payment_id.into(),
            card_last4: "8012".into(),
        })
        .unwrap();
        let ts = Utc::now() - ChronoDuration::seconds(age_secs);
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
    fn sweeps_only_rows_past_the_retention_window() {
        let db = Database::open_in_memory().unwrap();
        db.ensure_user(1, None, None).unwrap();
        seed(&db, "10001", 400);
        seed(&db, "10002", 301);
        seed(&db, "10003", 10);

        let expired = run_once(&db, DEFAULT_RETENTION).unwrap();
        assert_eq!(expired, 2);
        assert_eq!(
            db.get_payment("10003").unwrap().unwrap().status,
            PaymentStatus::Pending
        );
        assert_eq!(
            db.get_payment("10001").unwrap().unwrap().status,
            PaymentStatus::Expired
        );
    }
}
