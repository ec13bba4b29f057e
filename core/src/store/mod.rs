//! SQLite persistence layer.
//!
//! RULE: Only store/ talks to the database.
//! The engine reads through the RowSource / RegionRegistry traits and never
//! executes SQL directly. Every read query is audit-logged with its label
//! and bound parameters.

mod analytics;
mod counters;
mod region;

use crate::error::MetricsResult;
use rusqlite::Connection;

/// log target for executed query lines.
pub const AUDIT_TARGET: &str = "callstats::audit";

pub struct MetricsStore {
    conn: Connection,
    path: Option<String>, // None for :memory:, Some(path) for file
}

impl MetricsStore {
    pub fn open(path: &str) -> MetricsResult<Self> {
        if path == ":memory:" {
            return Self::in_memory();
        }
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self {
            conn,
            path: Some(path.to_string()),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> MetricsResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn, path: None })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> MetricsResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_region.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_daily_counters.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/003_record_analytics.sql"))?;
        Ok(())
    }

    /// Path of the backing file, None for in-memory stores.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }
}

fn audit(label: &str, sql: &str, params: &[(&str, String)]) {
    let bound = params
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(" ");
    let sql = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    log::info!(target: AUDIT_TARGET, "[{label}] {bound} :: {sql}");
}
