use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            user_id     INTEGER PRIMARY KEY,
            username    TEXT,
            phone       TEXT,
            first_name  TEXT,
            is_admin    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now'))
        );

        CREATE TABLE IF NOT EXISTS payments (
            id                  INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id             INTEGER NOT NULL REFERENCES users(user_id),
            provider            TEXT NOT NULL,
            player_id           TEXT NOT NULL,
            amount              TEXT NOT NULL,
            payment_id          TEXT NOT NULL UNIQUE,
            card_last4          TEXT NOT NULL,
            status              TEXT NOT NULL DEFAULT 'pending',
            created_at          TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now')),
            updated_at          TEXT,
            notice_chat_id      INTEGER,
            notice_message_id   INTEGER
        );

        CREATE INDEX IF NOT EXISTS idx_payments_status
            ON payments(status);
        CREATE INDEX IF NOT EXISTS idx_payments_card_amount
            ON payments(card_last4, status, created_at);

        CREATE TABLE IF NOT EXISTS withdrawals (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     INTEGER NOT NULL REFERENCES users(user_id),
            provider    TEXT NOT NULL,
            player_id   TEXT NOT NULL,
            card_number TEXT NOT NULL,
            code        TEXT NOT NULL,
            amount      TEXT,
            status      TEXT NOT NULL DEFAULT 'pending',
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now'))
        );

        CREATE TABLE IF NOT EXISTS cards (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            card_number TEXT NOT NULL UNIQUE,
            card_name   TEXT NOT NULL,
            is_active   INTEGER NOT NULL DEFAULT 1,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%d %H:%M:%f','now'))
        );
        ",
    )?;

    // Additive upgrades for database files created before these columns
    // existed. Failure to add one is not fatal; the affected feature
    // degrades instead.
    ensure_column(conn, "payments", "updated_at", "TEXT");
    ensure_column(conn, "payments", "notice_chat_id", "INTEGER");
    ensure_column(conn, "payments", "notice_message_id", "INTEGER");

    info!("Ledger migrations complete");
    Ok(())
}

/// True if `table` has a column named `column`.
pub fn has_column(conn: &Connection, table: &str, column: &str) -> Result<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table})"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

fn ensure_column(conn: &Connection, table: &str, column: &str, decl: &str) {
    match has_column(conn, table, column) {
        Ok(true) => {}
        Ok(false) => {
            let sql = format!("ALTER TABLE {table} ADD COLUMN {column} {decl}");
            if let Err(e) = conn.execute(&sql, []) {
                warn!("could not add {table}.{column}: {}", e);
            }
        }
        Err(e) => warn!("could not inspect {table}: {}", e),
    }
}
