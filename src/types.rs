//! Shared types for the BOOKIE engine.
//!
//! These types form the data model used across all modules.
//! They are designed to be stable so that store, oracle, and
//! engine modules can depend on them without circular references.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A point account owned by one external user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Chat-platform user id. Supplied by the caller, never generated here.
    pub id: i64,
    /// Current point balance. Never negative.
    pub balance: i64,
    /// Payout destination registered by the user, if any.
    pub wallet_address: Option<String>,
    pub total_wagers: i64,
    pub total_wins: i64,
    /// True while a pending wager exists for this account.
    pub active_wager: bool,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] balance={} wagers={} (W{}) active={} wallet={}",
            self.id,
            self.balance,
            self.total_wagers,
            self.total_wins,
            self.active_wager,
            if self.wallet_address.is_some() { "set" } else { "unset" },
        )
    }
}

impl Account {
    /// Win rate as a percentage. Returns 0.0 if no wagers were placed.
    pub fn win_rate(&self) -> f64 {
        if self.total_wagers == 0 {
            0.0
        } else {
            (self.total_wins as f64 / self.total_wagers as f64) * 100.0
        }
    }

    /// Whether a payout wallet has been registered.
    pub fn has_wallet(&self) -> bool {
        self.wallet_address.is_some()
    }
}

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Direction of a price wager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
}

impl Direction {
    /// The opposite direction.
    pub fn opposite(&self) -> Self {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
        }
    }

    /// Stable lowercase form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Up => write!(f, "UP"),
            Direction::Down => write!(f, "DOWN"),
        }
    }
}

/// Attempt to parse a string into a Direction (case-insensitive).
impl std::str::FromStr for Direction {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "up" | "long" | "rise" => Ok(Direction::Up),
            "down" | "short" | "fall" => Ok(Direction::Down),
            _ => Err(anyhow::anyhow!("Unknown wager direction: {s}")),
        }
    }
}

/// Lifecycle status of a wager. `Pending` is the only non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WagerStatus {
    Pending,
    Won,
    Lost,
    /// Exact price tie under the tie-refund configuration. Stake returned,
    /// no win or loss counted.
    Draw,
    /// No price could be obtained at settlement. Stake returned.
    Voided,
}

impl WagerStatus {
    /// All known statuses (useful for iteration).
    pub const ALL: &'static [WagerStatus] = &[
        WagerStatus::Pending,
        WagerStatus::Won,
        WagerStatus::Lost,
        WagerStatus::Draw,
        WagerStatus::Voided,
    ];

    /// Whether this status ends the wager lifecycle.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, WagerStatus::Pending)
    }

    /// Stable lowercase form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            WagerStatus::Pending => "pending",
            WagerStatus::Won => "won",
            WagerStatus::Lost => "lost",
            WagerStatus::Draw => "draw",
            WagerStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for WagerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WagerStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WagerStatus::Pending),
            "won" => Ok(WagerStatus::Won),
            "lost" => Ok(WagerStatus::Lost),
            "draw" => Ok(WagerStatus::Draw),
            "voided" => Ok(WagerStatus::Voided),
            _ => Err(anyhow::anyhow!("Unknown wager status: {s}")),
        }
    }
}

/// Review status of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WithdrawalStatus {
    Pending,
    Approved,
    Rejected,
}

impl WithdrawalStatus {
    /// Stable lowercase form used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            WithdrawalStatus::Pending => "pending",
            WithdrawalStatus::Approved => "approved",
            WithdrawalStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for WithdrawalStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(WithdrawalStatus::Pending),
            "approved" => Ok(WithdrawalStatus::Approved),
            "rejected" => Ok(WithdrawalStatus::Rejected),
            _ => Err(anyhow::anyhow!("Unknown withdrawal status: {s}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Wager
// ---------------------------------------------------------------------------

/// A single stake-direction-duration bet against a live price instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Wager {
    pub id: i64,
    pub account_id: i64,
    /// Instrument symbol in the provider's vocabulary (e.g. "BTCUSDT").
    pub instrument: String,
    pub direction: Direction,
    /// Points deducted from the balance at placement.
    pub stake: i64,
    /// Quote sampled at placement. Immutable afterwards.
    pub entry_price: Decimal,
    /// Quote sampled at settlement. Unset until settled; stays unset on
    /// a voided wager.
    pub exit_price: Option<Decimal>,
    pub placed_at: DateTime<Utc>,
    /// Settlement due time: `placed_at` plus the configured duration.
    pub due_at: DateTime<Utc>,
    pub status: WagerStatus,
    /// Points credited back at settlement (0 on a loss).
    pub payout: i64,
    pub settled_at: Option<DateTime<Utc>>,
}

impl fmt::Display for Wager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} acct={} {} {} stake={} entry={} status={}",
            self.id,
            self.account_id,
            self.direction,
            self.instrument,
            self.stake,
            self.entry_price,
            self.status,
        )
    }
}

impl Wager {
    /// Whether the wager has reached a terminal status.
    pub fn is_settled(&self) -> bool {
        self.status.is_terminal()
    }

    /// Net balance effect so far (payout minus stake).
    pub fn net_change(&self) -> i64 {
        self.payout - self.stake
    }

    /// Time remaining until the wager is due. Negative once overdue.
    pub fn time_remaining(&self) -> chrono::Duration {
        self.due_at - Utc::now()
    }
}

/// Parameters for inserting a new pending wager.
#[derive(Debug, Clone)]
pub struct NewWager {
    pub account_id: i64,
    pub instrument: String,
    pub direction: Direction,
    pub stake: i64,
    pub entry_price: Decimal,
    pub placed_at: DateTime<Utc>,
    pub due_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Withdrawal
// ---------------------------------------------------------------------------

/// A request to pay out an account's entire balance, reviewed by a human
/// operator out of band.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    pub id: i64,
    /// Operator-facing reference, stable across systems.
    pub reference: String,
    pub account_id: i64,
    pub wallet_address: String,
    /// The balance that was zeroed into this request.
    pub amount_points: i64,
    pub status: WithdrawalStatus,
    pub created_at: DateTime<Utc>,
}

impl fmt::Display for WithdrawalRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} [{}] acct={} {} pts -> {} ({})",
            self.id,
            self.reference,
            self.account_id,
            self.amount_points,
            self.wallet_address,
            self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// Quote
// ---------------------------------------------------------------------------

/// A single price observation from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quote {
    pub instrument: String,
    pub price: Decimal,
    /// Provider identifier (e.g. "binance").
    pub source: String,
    pub fetched_at: DateTime<Utc>,
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} ({})", self.instrument, self.price, self.source)
    }
}

impl Quote {
    /// Age of this observation.
    pub fn age(&self) -> chrono::Duration {
        Utc::now() - self.fetched_at
    }
}

// ---------------------------------------------------------------------------
// Settlement report
// ---------------------------------------------------------------------------

/// Outcome of one settlement call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settlement {
    pub wager_id: i64,
    pub account_id: i64,
    pub status: WagerStatus,
    pub entry_price: Decimal,
    pub exit_price: Option<Decimal>,
    pub payout: i64,
    pub balance_after: i64,
    /// False when this call found the wager already settled and merely
    /// reported the recorded outcome.
    pub newly_settled: bool,
}

impl fmt::Display for Settlement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "wager #{} {} payout={} balance={}",
            self.wager_id, self.status, self.payout, self.balance_after,
        )
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Notification events emitted by the engine. The chat layer subscribes and
/// renders these; each event carries everything needed so subscribers never
/// re-query engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineEvent {
    WagerPlaced {
        account_id: i64,
        wager_id: i64,
        instrument: String,
        direction: Direction,
        stake: i64,
        entry_price: Decimal,
        due_at: DateTime<Utc>,
        balance_after: i64,
    },
    WagerSettled {
        account_id: i64,
        wager_id: i64,
        status: WagerStatus,
        entry_price: Decimal,
        exit_price: Option<Decimal>,
        payout: i64,
        balance_after: i64,
    },
    WithdrawalRequested {
        account_id: i64,
        request_id: i64,
        reference: String,
        wallet_address: String,
        amount_points: i64,
    },
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for BOOKIE.
#[derive(Debug, thiserror::Error)]
pub enum WagerError {
    #[error("Stake too low: minimum is {minimum}, got {stake}")]
    StakeTooLow { stake: i64, minimum: i64 },

    #[error("Insufficient balance: need {needed}, have {available}")]
    InsufficientBalance { needed: i64, available: i64 },

    #[error("Account {0} already has a wager in flight")]
    WagerAlreadyActive(i64),

    #[error("Price unavailable for {instrument}: {reason}")]
    PriceUnavailable { instrument: String, reason: String },

    #[error("Invalid wallet address: {0}")]
    InvalidWalletFormat(String),

    #[error("No wallet address registered for account {0}")]
    WalletNotSet(i64),

    #[error("Balance below withdrawal minimum: need {minimum}, have {available}")]
    BelowMinimum { available: i64, minimum: i64 },

    #[error("Wager not found: {0}")]
    WagerNotFound(i64),

    #[error("Storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
