//! Ops API route handlers.
//!
//! All endpoints return JSON and read straight from the stores. State is
//! shared via `Arc<OpsState>`.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::store::{AccountLedger, WagerStore, WithdrawalStore};
use crate::types::{Wager, WagerError, WithdrawalRequest};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct OpsState {
    pub ledger: AccountLedger,
    pub wagers: WagerStore,
    pub withdrawals: WithdrawalStore,
    pub started_at: DateTime<Utc>,
}

impl OpsState {
    pub fn new(ledger: AccountLedger, wagers: WagerStore, withdrawals: WithdrawalStore) -> Self {
        Self {
            ledger,
            wagers,
            withdrawals,
            started_at: Utc::now(),
        }
    }
}

pub type AppState = Arc<OpsState>;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub uptime_secs: i64,
    pub accounts: i64,
    pub wagers_by_status: HashMap<String, i64>,
    pub pending_withdrawals: i64,
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Result<Json<StatsResponse>, StatusCode> {
    let accounts = state.ledger.count().await.map_err(internal)?;
    let counts = state.wagers.status_counts().await.map_err(internal)?;
    let pending_withdrawals = state.withdrawals.pending_count().await.map_err(internal)?;

    Ok(Json(StatsResponse {
        uptime_secs: (Utc::now() - state.started_at).num_seconds(),
        accounts,
        wagers_by_status: counts.into_iter().collect(),
        pending_withdrawals,
    }))
}

/// GET /api/withdrawals/pending
pub async fn get_pending_withdrawals(
    State(state): State<AppState>,
) -> Result<Json<Vec<WithdrawalRequest>>, StatusCode> {
    Ok(Json(state.withdrawals.pending().await.map_err(internal)?))
}

/// GET /api/wagers/recent
pub async fn get_recent_wagers(
    State(state): State<AppState>,
) -> Result<Json<Vec<Wager>>, StatusCode> {
    Ok(Json(state.wagers.recent_settled(100).await.map_err(internal)?))
}

/// GET /health
pub async fn health() -> StatusCode {
    StatusCode::OK
}

fn internal(e: WagerError) -> StatusCode {
    tracing::error!(error = %e, "Ops query failed");
    StatusCode::INTERNAL_SERVER_ERROR
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
