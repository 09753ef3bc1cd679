//! Withdrawal sub-ledger.
//!
//! Requests are written once by the engine and reviewed by a human
//! operator out of band. Each carries a unique reference so operator
//! tooling can correlate records across systems.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::types::{WagerError, WithdrawalRequest, WithdrawalStatus};

use super::{datetime_to_ms, decode_err, ms_to_datetime};

/// SQLite-backed withdrawal request store.
#[derive(Clone)]
pub struct WithdrawalStore {
    pool: SqlitePool,
}

impl WithdrawalStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record a new request in `pending` status.
    pub async fn create(
        &self,
        account_id: i64,
        wallet_address: &str,
        amount_points: i64,
    ) -> Result<WithdrawalRequest, WagerError> {
        let reference = uuid::Uuid::new_v4().to_string();
        let result = sqlx::query(
            "INSERT INTO withdrawal_requests
                (reference, account_id, wallet_address, amount_points, status, created_at)
             VALUES (?, ?, ?, ?, 'pending', ?)",
        )
        .bind(&reference)
        .bind(account_id)
        .bind(wallet_address)
        .bind(amount_points)
        .bind(datetime_to_ms(Utc::now()))
        .execute(&self.pool)
        .await?;

        self.require(result.last_insert_rowid()).await
    }

    pub async fn get(&self, id: i64) -> Result<Option<WithdrawalRequest>, WagerError> {
        let row = sqlx::query("SELECT * FROM withdrawal_requests WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_request).transpose()?)
    }

    /// Requests awaiting review, oldest first.
    pub async fn pending(&self) -> Result<Vec<WithdrawalRequest>, WagerError> {
        let rows = sqlx::query(
            "SELECT * FROM withdrawal_requests
             WHERE status = 'pending'
             ORDER BY created_at, id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?)
    }

    /// Number of requests awaiting review.
    pub async fn pending_count(&self) -> Result<i64, WagerError> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS n FROM withdrawal_requests WHERE status = 'pending'",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("n"))
    }

    /// Resolve a pending request (for operator tooling). Conditional on
    /// the request still being pending; returns `None` if it was already
    /// resolved.
    pub async fn resolve(
        &self,
        id: i64,
        approved: bool,
    ) -> Result<Option<WithdrawalRequest>, WagerError> {
        let status = if approved {
            WithdrawalStatus::Approved
        } else {
            WithdrawalStatus::Rejected
        };

        let result = sqlx::query(
            "UPDATE withdrawal_requests SET status = ?
             WHERE id = ? AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }

        Ok(Some(self.require(id).await?))
    }

    async fn require(&self, id: i64) -> Result<WithdrawalRequest, WagerError> {
        self.get(id)
            .await?
            .ok_or(WagerError::Storage(sqlx::Error::RowNotFound))
    }
}

fn row_to_request(row: &SqliteRow) -> Result<WithdrawalRequest, sqlx::Error> {
    let status: String = row.try_get("status")?;

    Ok(WithdrawalRequest {
        id: row.try_get("id")?,
        reference: row.try_get("reference")?,
        account_id: row.try_get("account_id")?,
        wallet_address: row.try_get("wallet_address")?,
        amount_points: row.try_get("amount_points")?,
        status: status.parse().map_err(|e| decode_err("status", e))?,
        created_at: ms_to_datetime(row.try_get("created_at")?),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
