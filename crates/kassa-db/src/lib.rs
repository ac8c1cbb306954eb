pub mod migrations;
pub mod models;
pub mod queries;

use std::path::Path;
use std::sync::Mutex;

use anyhow::Result;
use rusqlite::Connection;
use tracing::{info, warn};

/// The ledger: sole source of truth for payments, withdrawals, cards and
/// users. One connection behind one process-wide mutex; every critical
/// section is a single statement, so mutations never interleave
/// destructively. Write volume is human-paced, so the coarse lock is the
/// whole concurrency story.
pub struct Database {
    conn: Mutex<Connection>,
    /// Whether the payment-notice columns exist. Legacy database files
    /// that cannot be altered keep working with notice cleanup disabled.
    notice_columns: bool,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        let db = Self::init(conn)?;
        info!("Ledger opened at {}", path.display());
        Ok(db)
    }

    /// In-memory ledger, used by tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        let notice_columns = migrations::has_column(&conn, "payments", "notice_chat_id")?
            && migrations::has_column(&conn, "payments", "notice_message_id")?;
        if !notice_columns {
            warn!("payments table has no notice columns; notice cleanup disabled");
        }

        Ok(Self {
            conn: Mutex::new(conn),
            notice_columns,
        })
    }

    pub fn notice_columns(&self) -> bool {
        self.notice_columns
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow::anyhow!("ledger lock poisoned: {}", e))?;
        f(&conn)
    }
}
