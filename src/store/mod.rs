//! Persistence layer.
//!
//! A single SQLite database holds accounts, wagers, and withdrawal
//! requests. Prices are stored as decimal strings (never floats) and
//! timestamps as integer milliseconds since the Unix epoch. Schema is
//! applied idempotently on open, so a fresh database file is ready
//! without a separate migration step.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

pub mod accounts;
pub mod wagers;
pub mod withdrawals;

pub use accounts::{AccountLedger, WalletRules};
pub use wagers::WagerStore;
pub use withdrawals::WithdrawalStore;

/// Schema statements, applied one at a time (SQLite prepares single
/// statements only).
const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS accounts (
        id INTEGER PRIMARY KEY,
        balance INTEGER NOT NULL CHECK (balance >= 0),
        wallet_address TEXT,
        total_wagers INTEGER NOT NULL DEFAULT 0,
        total_wins INTEGER NOT NULL DEFAULT 0,
        active_wager INTEGER NOT NULL DEFAULT 0,
        created_at INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS wagers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        account_id INTEGER NOT NULL REFERENCES accounts(id),
        instrument TEXT NOT NULL,
        direction TEXT NOT NULL,
        stake INTEGER NOT NULL,
        entry_price TEXT NOT NULL,
        exit_price TEXT,
        placed_at INTEGER NOT NULL,
        due_at INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        payout INTEGER NOT NULL DEFAULT 0,
        settled_at INTEGER
    )",
    // One pending wager per account, enforced at the storage level.
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_wagers_one_pending
        ON wagers(account_id) WHERE status = 'pending'",
    "CREATE INDEX IF NOT EXISTS idx_wagers_due
        ON wagers(due_at) WHERE status = 'pending'",
    "CREATE TABLE IF NOT EXISTS withdrawal_requests (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        reference TEXT NOT NULL UNIQUE,
        account_id INTEGER NOT NULL REFERENCES accounts(id),
        wallet_address TEXT NOT NULL,
        amount_points INTEGER NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        created_at INTEGER NOT NULL
    )",
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_status
        ON withdrawal_requests(status)",
];

/// Open (creating if needed) the database at `path` and apply the schema.
pub async fn open(path: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))
        .with_context(|| format!("Invalid database path: {path}"))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to open database: {path}"))?;

    ensure_schema(&pool).await?;
    info!(path, "Database ready");
    Ok(pool)
}

async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    for statement in SCHEMA {
        sqlx::query(statement)
            .execute(pool)
            .await
            .context("Failed to apply schema statement")?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Row conversion helpers
// ---------------------------------------------------------------------------

/// Convert a stored millisecond timestamp to `DateTime<Utc>`.
pub(crate) fn ms_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}

/// Convert a `DateTime<Utc>` to the stored millisecond form.
pub(crate) fn datetime_to_ms(dt: DateTime<Utc>) -> i64 {
    dt.timestamp_millis()
}

/// Parse a stored decimal string, reporting the column on failure.
pub(crate) fn parse_price(raw: &str, column: &str) -> Result<Decimal, sqlx::Error> {
    Decimal::from_str(raw).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

/// Wrap an enum-parse failure as a column decode error.
pub(crate) fn decode_err(column: &str, e: anyhow::Error) -> sqlx::Error {
    sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: e.into(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
