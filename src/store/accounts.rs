//! Account ledger.
//!
//! Owns every balance mutation. All mutating operations are expressed
//! as conditional UPDATE statements so that concurrent calls for the
//! same account serialize at the database and can never double-apply.
//! Read-then-write without a precondition is not allowed here.

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::types::{Account, WagerError};

use super::{datetime_to_ms, ms_to_datetime};

// ---------------------------------------------------------------------------
// Wallet rules
// ---------------------------------------------------------------------------

/// Format requirements for a payout wallet address.
#[derive(Debug, Clone)]
pub struct WalletRules {
    /// Required address prefix, e.g. "0x".
    pub prefix: String,
    /// Minimum accepted address length after trimming.
    pub min_len: usize,
}

impl WalletRules {
    /// Validate and normalize an address. Returns the trimmed form.
    pub fn validate<'a>(&self, address: &'a str) -> Result<&'a str, WagerError> {
        let trimmed = address.trim();
        if trimmed.len() < self.min_len || !trimmed.starts_with(&self.prefix) {
            return Err(WagerError::InvalidWalletFormat(address.to_string()));
        }
        Ok(trimmed)
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// SQLite-backed account ledger.
#[derive(Clone)]
pub struct AccountLedger {
    pool: SqlitePool,
    starting_balance: i64,
    wallet_rules: WalletRules,
}

impl AccountLedger {
    pub fn new(pool: SqlitePool, starting_balance: i64, wallet_rules: WalletRules) -> Self {
        Self {
            pool,
            starting_balance,
            wallet_rules,
        }
    }

    /// Fetch an account, creating it with the starting balance on first
    /// reference. A single upsert, so two concurrent first contacts
    /// produce one row and both callers see it.
    pub async fn get_or_create(&self, id: i64) -> Result<Account, WagerError> {
        let row = sqlx::query(
            "INSERT INTO accounts (id, balance, created_at)
             VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET id = excluded.id
             RETURNING *",
        )
        .bind(id)
        .bind(self.starting_balance)
        .bind(datetime_to_ms(Utc::now()))
        .fetch_one(&self.pool)
        .await?;

        Ok(row_to_account(&row)?)
    }

    /// Fetch an account without creating it.
    pub async fn get(&self, id: i64) -> Result<Option<Account>, WagerError> {
        let row = sqlx::query("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.as_ref().map(row_to_account).transpose()?)
    }

    /// Atomically deduct `amount` and flip the active-wager flag, but only
    /// if the balance covers it and no wager is already in flight. Returns
    /// `None` (no mutation) when the gate rejects. This single conditional
    /// write is what keeps two concurrent placements from both succeeding.
    pub async fn try_debit_and_lock(
        &self,
        id: i64,
        amount: i64,
    ) -> Result<Option<Account>, WagerError> {
        let result = sqlx::query(
            "UPDATE accounts
             SET balance = balance - ?,
                 active_wager = 1,
                 total_wagers = total_wagers + 1
             WHERE id = ? AND balance >= ? AND active_wager = 0",
        )
        .bind(amount)
        .bind(id)
        .bind(amount)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(account_id = id, amount, "Debit gate rejected");
            return Ok(None);
        }

        Ok(Some(self.fetch_required(id).await?))
    }

    /// Add `payout` to the balance, clear the active-wager flag, and count
    /// a win when `won`. Unconditional; callers guarantee they hold the
    /// settlement transition before crediting.
    pub async fn credit_and_unlock(
        &self,
        id: i64,
        payout: i64,
        won: bool,
    ) -> Result<Account, WagerError> {
        sqlx::query(
            "UPDATE accounts
             SET balance = balance + ?,
                 active_wager = 0,
                 total_wins = total_wins + ?
             WHERE id = ?",
        )
        .bind(payout)
        .bind(i64::from(won))
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.fetch_required(id).await
    }

    /// Add points back without touching flags or counters. Used to undo a
    /// zeroed balance when recording the withdrawal request fails.
    pub async fn credit(&self, id: i64, amount: i64) -> Result<(), WagerError> {
        sqlx::query("UPDATE accounts SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Zero the balance for a withdrawal if it meets `minimum` and a wallet
    /// is registered. Returns the prior balance, or `None` with no mutation
    /// when a precondition fails or a concurrent caller got there first.
    pub async fn zero_balance_for_withdrawal(
        &self,
        id: i64,
        minimum: i64,
    ) -> Result<Option<i64>, WagerError> {
        let Some(account) = self.get(id).await? else {
            return Ok(None);
        };
        if account.balance < minimum || account.wallet_address.is_none() {
            return Ok(None);
        }

        // Compare-and-swap on the balance just read; any interleaved
        // mutation changes it and the match fails.
        let result = sqlx::query(
            "UPDATE accounts SET balance = 0
             WHERE id = ? AND balance = ? AND wallet_address IS NOT NULL",
        )
        .bind(id)
        .bind(account.balance)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(account_id = id, "Balance changed under withdrawal, rejecting");
            return Ok(None);
        }

        Ok(Some(account.balance))
    }

    /// Register a payout wallet, creating the account if this is its first
    /// contact. The address is validated and stored trimmed.
    pub async fn set_wallet(&self, id: i64, address: &str) -> Result<Account, WagerError> {
        let trimmed = self.wallet_rules.validate(address)?;
        self.get_or_create(id).await?;

        sqlx::query("UPDATE accounts SET wallet_address = ? WHERE id = ?")
            .bind(trimmed)
            .bind(id)
            .execute(&self.pool)
            .await?;

        self.fetch_required(id).await
    }

    /// Total number of accounts.
    pub async fn count(&self) -> Result<i64, WagerError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM accounts")
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get("n"))
    }

    async fn fetch_required(&self, id: i64) -> Result<Account, WagerError> {
        self.get(id)
            .await?
            .ok_or(WagerError::Storage(sqlx::Error::RowNotFound))
    }
}

fn row_to_account(row: &SqliteRow) -> Result<Account, sqlx::Error> {
    Ok(Account {
        id: row.try_get("id")?,
        balance: row.try_get("balance")?,
        wallet_address: row.try_get("wallet_address")?,
        total_wagers: row.try_get("total_wagers")?,
        total_wins: row.try_get("total_wins")?,
        active_wager: row.try_get::<i64, _>("active_wager")? != 0,
        created_at: ms_to_datetime(row.try_get("created_at")?),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
