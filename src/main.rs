//! BOOKIE — Point-Wager Settlement Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the SQLite ledger, and runs the settlement scheduler plus the
//! ops API with graceful shutdown.

use anyhow::Result;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

use bookie::config;
use bookie::engine::outcome::OutcomeRules;
use bookie::engine::scheduler::Scheduler;
use bookie::engine::{EngineRules, SettlementEngine};
use bookie::ops;
use bookie::ops::routes::OpsState;
use bookie::oracle::binance::BinanceSource;
use bookie::oracle::coingecko::CoinGeckoSource;
use bookie::oracle::{PriceOracle, PriceSource};
use bookie::store::{self, AccountLedger, WagerStore, WalletRules, WithdrawalStore};
use bookie::types::EngineEvent;

const BANNER: &str = r#"
 ____    ___    ___   _  __ ___  _____
| __ )  / _ \  / _ \ | |/ /|_ _|| ____|
|  _ \ | | | || | | || ' /  | | |  _|
| |_) || |_| || |_| || . \  | | | |___
|____/  \___/  \___/ |_|\_\|___||_____|

  Point-Wager Settlement Engine
  v0.1.0 — Settlement Daemon
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    // Load configuration from TOML
    let cfg = config::AppConfig::load("config.toml")?;

    // Initialise structured logging
    init_logging();

    // Print startup banner
    println!("{BANNER}");
    info!(
        provider = %cfg.oracle.provider,
        instrument = %cfg.oracle.default_instrument,
        wager_duration_secs = cfg.engine.wager_duration_secs,
        starting_balance = cfg.engine.starting_balance,
        "BOOKIE starting up"
    );

    // -- Storage ----------------------------------------------------------

    let pool = store::open(&cfg.database_path()).await?;

    let ledger = AccountLedger::new(
        pool.clone(),
        cfg.engine.starting_balance,
        WalletRules {
            prefix: cfg.withdrawal.wallet_prefix.clone(),
            min_len: cfg.withdrawal.wallet_min_len,
        },
    );
    let wagers = WagerStore::new(pool.clone());
    let withdrawals = WithdrawalStore::new(pool.clone());

    // -- Price oracle -----------------------------------------------------

    let source: Arc<dyn PriceSource> = match cfg.oracle.provider.as_str() {
        "binance" => Arc::new(BinanceSource::new(cfg.oracle.request_timeout_secs)?),
        "coingecko" => Arc::new(CoinGeckoSource::new(cfg.oracle.request_timeout_secs)?),
        other => {
            warn!(provider = other, "Unknown price provider, defaulting to Binance");
            Arc::new(BinanceSource::new(cfg.oracle.request_timeout_secs)?)
        }
    };
    info!(source = source.name(), "Price oracle ready");
    let oracle = PriceOracle::new(source, cfg.oracle.cache_ttl_secs);

    // -- Engine and scheduler ----------------------------------------------

    let (schedule_tx, schedule_rx) = tokio::sync::mpsc::unbounded_channel();

    let rules = EngineRules {
        minimum_stake: cfg.engine.minimum_stake,
        wager_duration: chrono::Duration::seconds(cfg.engine.wager_duration_secs as i64),
        outcome: OutcomeRules {
            win_multiplier_pct: cfg.engine.win_multiplier_pct,
            win_bonus: cfg.engine.win_bonus,
            refund_ties: cfg.engine.refund_ties,
        },
        withdrawal_minimum: cfg.withdrawal.minimum_points,
    };

    let engine = Arc::new(SettlementEngine::new(
        ledger.clone(),
        wagers.clone(),
        withdrawals.clone(),
        oracle,
        rules,
        schedule_tx,
    ));

    // The scheduler re-arms every pending wager on boot, so settlements
    // survive restarts.
    let scheduler = Scheduler::new(
        engine.clone(),
        wagers.clone(),
        schedule_rx,
        cfg.scheduler.sweep_interval_secs,
    );
    tokio::spawn(scheduler.run());

    // -- Ops server --------------------------------------------------------

    if cfg.ops.enabled {
        let state = Arc::new(OpsState::new(
            ledger.clone(),
            wagers.clone(),
            withdrawals.clone(),
        ));
        ops::spawn_ops(state, cfg.ops.port);
    }

    // -- Event log ---------------------------------------------------------

    let mut events = engine.subscribe();
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => log_event(&event),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!(missed, "Event log fell behind");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    info!("Engine running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Shutdown signal received.");
    pool.close().await;
    info!("BOOKIE shut down cleanly.");

    Ok(())
}

/// Log a human-readable line per engine event.
fn log_event(event: &EngineEvent) {
    match event {
        EngineEvent::WagerPlaced {
            account_id,
            wager_id,
            instrument,
            direction,
            stake,
            entry_price,
            ..
        } => {
            info!(
                account_id,
                wager_id,
                instrument = %instrument,
                direction = %direction,
                stake,
                entry_price = %entry_price,
                "Wager placed"
            );
        }
        EngineEvent::WagerSettled {
            account_id,
            wager_id,
            status,
            payout,
            balance_after,
            ..
        } => {
            info!(
                account_id,
                wager_id,
                status = %status,
                payout,
                balance_after,
                "Wager settled"
            );
        }
        EngineEvent::WithdrawalRequested {
            account_id,
            reference,
            amount_points,
            ..
        } => {
            info!(
                account_id,
                reference = %reference,
                amount_points,
                "Withdrawal requested, queued for manual review"
            );
        }
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("bookie=info"));

    let json_logging = std::env::var("BOOKIE_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
