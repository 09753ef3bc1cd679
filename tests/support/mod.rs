//! Shared harness for integration tests.
//!
//! Wires a real engine, scheduler, and SQLite store against a
//! deterministic in-memory price source. Wager durations are kept
//! short so settlements fire within the test body.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bookie::engine::outcome::OutcomeRules;
use bookie::engine::scheduler::Scheduler;
use bookie::engine::{EngineRules, SettlementEngine};
use bookie::oracle::{PriceOracle, PriceSource};
use bookie::store::{self, AccountLedger, WagerStore, WalletRules, WithdrawalStore};
use bookie::types::{Quote, Wager, WagerError, WagerStatus};

pub const STARTING_BALANCE: i64 = 1000;
pub const MINIMUM_STAKE: i64 = 10;
pub const WITHDRAWAL_MINIMUM: i64 = 500;
pub const WALLET: &str = "0x1234567890abcdef1234";

// ---------------------------------------------------------------------------
// Scripted price source
// ---------------------------------------------------------------------------

/// A price source fully controllable from test code.
///
/// Every fetch returns the current scripted price. `set_error` forces
/// subsequent fetches to fail until cleared.
pub struct ScriptedPrices {
    price: Mutex<Decimal>,
    force_error: Mutex<Option<String>>,
    fetches: AtomicUsize,
}

impl ScriptedPrices {
    pub fn new(initial: Decimal) -> Self {
        Self {
            price: Mutex::new(initial),
            force_error: Mutex::new(None),
            fetches: AtomicUsize::new(0),
        }
    }

    /// Change the price returned by subsequent fetches.
    pub fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = price;
    }

    /// Force all subsequent fetches to fail.
    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    /// Clear any forced error.
    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    /// Number of fetches served so far.
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PriceSource for ScriptedPrices {
    async fn fetch(&self, instrument: &str) -> Result<Quote, WagerError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(msg) = self.force_error.lock().unwrap().as_ref() {
            return Err(WagerError::PriceUnavailable {
                instrument: instrument.to_string(),
                reason: msg.clone(),
            });
        }
        Ok(Quote {
            instrument: instrument.to_string(),
            price: *self.price.lock().unwrap(),
            source: "scripted".to_string(),
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub engine: Arc<SettlementEngine>,
    pub ledger: AccountLedger,
    pub wagers: WagerStore,
    pub withdrawals: WithdrawalStore,
    pub prices: Arc<ScriptedPrices>,
}

pub fn default_rules() -> EngineRules {
    EngineRules {
        minimum_stake: MINIMUM_STAKE,
        wager_duration: chrono::Duration::milliseconds(250),
        outcome: OutcomeRules {
            win_multiplier_pct: 150,
            win_bonus: 0,
            refund_ties: false,
        },
        withdrawal_minimum: WITHDRAWAL_MINIMUM,
    }
}

pub fn temp_db_path() -> String {
    std::env::temp_dir()
        .join(format!("bookie_itest_{}.db", uuid::Uuid::new_v4()))
        .to_string_lossy()
        .into_owned()
}

/// Full engine over a fresh temp database with the default rules.
pub async fn harness(initial_price: Decimal) -> Harness {
    harness_with(initial_price, default_rules()).await
}

pub async fn harness_with(initial_price: Decimal, rules: EngineRules) -> Harness {
    harness_at(&temp_db_path(), initial_price, rules).await
}

/// Like [`harness_with`] but over an existing database path, for tests
/// that span a simulated restart.
pub async fn harness_at(path: &str, initial_price: Decimal, rules: EngineRules) -> Harness {
    let pool = store::open(path).await.unwrap();

    let ledger = AccountLedger::new(
        pool.clone(),
        STARTING_BALANCE,
        WalletRules {
            prefix: "0x".to_string(),
            min_len: 20,
        },
    );
    let wagers = WagerStore::new(pool.clone());
    let withdrawals = WithdrawalStore::new(pool);

    let prices = Arc::new(ScriptedPrices::new(initial_price));
    // TTL zero so settlement re-fetches instead of reusing the entry quote.
    let oracle = PriceOracle::new(prices.clone(), 0);

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let engine = Arc::new(SettlementEngine::new(
        ledger.clone(),
        wagers.clone(),
        withdrawals.clone(),
        oracle,
        rules,
        tx,
    ));

    let scheduler = Scheduler::new(engine.clone(), wagers.clone(), rx, 1);
    tokio::spawn(scheduler.run());

    Harness {
        engine,
        ledger,
        wagers,
        withdrawals,
        prices,
    }
}

/// Poll until the wager leaves `pending` or the timeout elapses.
pub async fn wait_settled(wagers: &WagerStore, wager_id: i64) -> Wager {
    for _ in 0..100 {
        let wager = wagers.require(wager_id).await.unwrap();
        if wager.status != WagerStatus::Pending {
            return wager;
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }
    panic!("wager {wager_id} did not settle within the timeout");
}
