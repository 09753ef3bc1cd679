//! Wager store.
//!
//! Wager rows are append-then-settle: created as `pending`, transitioned
//! exactly once to a terminal status, never deleted. The conditional
//! transition in [`WagerStore::mark_settled`] is what makes settlement
//! idempotent under duplicate scheduler deliveries.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::types::{NewWager, Wager, WagerError, WagerStatus};

use super::{datetime_to_ms, decode_err, ms_to_datetime, parse_price};

/// SQLite-backed wager store.
#[derive(Clone)]
pub struct WagerStore {
    pool: SqlitePool,
}

impl WagerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert a new pending wager and return the stored row.
    /// Fails if the account already has a pending wager (unique index).
    pub async fn create(&self, new: &NewWager) -> Result<Wager, WagerError> {
        let result = sqlx::query(
            "INSERT INTO wagers
                (account_id, instrument, direction, stake, entry_price,
                 placed_at, due_at, status)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'pending')",
        )
        .bind(new.account_id)
        .bind(&new.instrument)
        .bind(new.direction.as_str())
        .bind(new.stake)
        .bind(new.entry_price.to_string())
        .bind(datetime_to_ms(new.placed_at))
        .bind(datetime_to_ms(new.due_at))
        .execute(&self.pool)
        .await?;

        self.require(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<Wager>, WagerError> {
        let row = sqlx::query("SELECT * FROM wagers WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_wager).transpose()?)
    }

    /// Like [`WagerStore::get`] but absent rows are an error.
    pub async fn require(&self, id: i64) -> Result<Wager, WagerError> {
        self.get(id).await?.ok_or(WagerError::WagerNotFound(id))
    }

    /// Transition a wager from `pending` to a terminal status, but only if
    /// it is still pending. Returns `None` (no mutation) when another call
    /// already settled it. The caller credits the ledger only on `Some`.
    pub async fn mark_settled(
        &self,
        id: i64,
        status: WagerStatus,
        exit_price: Option<Decimal>,
        payout: i64,
    ) -> Result<Option<Wager>, WagerError> {
        let result = sqlx::query(
            "UPDATE wagers
             SET status = ?, exit_price = ?, payout = ?, settled_at = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(exit_price.map(|p| p.to_string()))
        .bind(payout)
        .bind(datetime_to_ms(Utc::now()))
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(self.require(id).await?))
    }

    /// All pending wagers, oldest due first. Used for boot recovery.
    pub async fn pending(&self) -> Result<Vec<Wager>, WagerError> {
        let rows = sqlx::query(
            "SELECT * FROM wagers WHERE status = 'pending' ORDER BY due_at",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_wager).collect::<Result<Vec<_>, _>>()?)
    }

    /// Pending wagers whose due time has passed. Used by the sweep.
    pub async fn due_pending(&self, now: DateTime<Utc>) -> Result<Vec<Wager>, WagerError> {
        let rows = sqlx::query(
            "SELECT * FROM wagers
             WHERE status = 'pending' AND due_at <= ?
             ORDER BY due_at",
        )
        .bind(datetime_to_ms(now))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_wager).collect::<Result<Vec<_>, _>>()?)
    }

    /// Most recently settled wagers, newest first.
    pub async fn recent_settled(&self, limit: i64) -> Result<Vec<Wager>, WagerError> {
        let rows = sqlx::query(
            "SELECT * FROM wagers
             WHERE status != 'pending'
             ORDER BY settled_at DESC
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_wager).collect::<Result<Vec<_>, _>>()?)
    }

    /// Wager counts grouped by status.
    pub async fn status_counts(&self) -> Result<Vec<(String, i64)>, WagerError> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS n FROM wagers GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(|r| (r.get("status"), r.get("n"))).collect())
    }
}

fn row_to_wager(row: &SqliteRow) -> Result<Wager, sqlx::Error> {
    let direction: String = row.try_get("direction")?;
    let status: String = row.try_get("status")?;
    let entry_price: String = row.try_get("entry_price")?;
    let exit_price: Option<String> = row.try_get("exit_price")?;

    Ok(Wager {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        instrument: row.try_get("instrument")?,
        direction: direction.parse().map_err(|e| decode_err("direction", e))?,
        stake: row.try_get("stake")?,
        entry_price: parse_price(&entry_price, "entry_price")?,
        exit_price: exit_price
            .as_deref()
            .map(|p| parse_price(p, "exit_price"))
            .transpose()?,
        placed_at: ms_to_datetime(row.try_get("placed_at")?),
        due_at: ms_to_datetime(row.try_get("due_at")?),
        status: status.parse().map_err(|e| decode_err("status", e))?,
        payout: row.try_get("payout")?,
        settled_at: row
            .try_get::<Option<i64>, _>("settled_at")?
            .map(ms_to_datetime),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
