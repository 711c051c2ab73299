//! SQLite persistence: search fields and tweets.
//!
//! Schema lives in `/sql/*.sql`, embedded at compile time and applied in
//! file-name order on every open. All statements use `IF NOT EXISTS`.

pub mod search_fields;
pub mod tweets;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::error::StoreError;

pub use tweets::{StoredTweet, TweetSink, WriteSummary};

const MIGRATIONS: &[(&str, &str)] = &[
    ("00_search_fields.sql", include_str!("../../sql/00_search_fields.sql")),
    ("01_tweets.sql", include_str!("../../sql/01_tweets.sql")),
];

/// Shared handle to the service database.
///
/// A single connection behind a mutex; every operation is a short
/// synchronous statement or transaction.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (creating if needed) a database file and apply migrations.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        log::info!("📊 Opened database {} (WAL)", path.display());

        Self::init(conn)
    }

    /// Private in-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(mut conn: Connection) -> Result<Self, StoreError> {
        run_migrations(&mut conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A panic while holding the lock cannot leave SQLite half-written, so
    /// a poisoned mutex is recovered rather than propagated.
    pub(crate) fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn run_migrations(conn: &mut Connection) -> Result<(), StoreError> {
    log::info!("🔧 Running schema migrations");
    let tx = conn.transaction()?;
    for (name, sql) in MIGRATIONS {
        log::debug!("   ├─ Executing: {}", name);
        tx.execute_batch(sql)?;
    }
    tx.commit()?;
    log::info!("   └─ ✅ {} migrations applied", MIGRATIONS.len());
    Ok(())
}

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339()
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Corrupt(format!("bad timestamp '{raw}': {e}")))
}
