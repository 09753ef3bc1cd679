//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The database path can be overridden at runtime via the `BOOKIE_DB`
//! environment variable, which keeps deployments and tests apart.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub withdrawal: WithdrawalConfig,
    pub oracle: OracleConfig,
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub ops: OpsConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EngineConfig {
    /// Balance granted when an account is first seen.
    pub starting_balance: i64,
    /// Smallest stake accepted for a wager.
    pub minimum_stake: i64,
    /// Seconds between placement and settlement.
    pub wager_duration_secs: u64,
    /// Win payout as a percentage of the stake (150 = stake * 1.5).
    pub win_multiplier_pct: i64,
    /// Flat points added on top of a winning payout.
    #[serde(default)]
    pub win_bonus: i64,
    /// When true an exact price tie refunds the stake instead of losing.
    #[serde(default)]
    pub refund_ties: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WithdrawalConfig {
    /// Minimum balance required before a withdrawal can be requested.
    pub minimum_points: i64,
    /// Required prefix for wallet addresses (e.g. "0x").
    pub wallet_prefix: String,
    /// Minimum accepted wallet address length.
    pub wallet_min_len: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    /// Price provider: "binance" or "coingecko".
    pub provider: String,
    /// Instrument symbol wagers are placed against.
    pub default_instrument: String,
    pub request_timeout_secs: u64,
    /// How long a fetched quote stays fresh. Zero disables caching.
    pub cache_ttl_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Seconds between safety-net sweeps for overdue wagers.
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OpsConfig {
    pub enabled: bool,
    pub port: u16,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Database path, honoring the `BOOKIE_DB` environment override.
    pub fn database_path(&self) -> String {
        std::env::var("BOOKIE_DB").unwrap_or_else(|_| self.storage.database_path.clone())
    }
}
