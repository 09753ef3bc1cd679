//! Binance spot ticker source.
//!
//! API docs: https://binance-docs.github.io/apidocs/spot/en/
//! Base URL: https://api.binance.com/api/v3
//! Auth: none required for public ticker reads.
//! Prices arrive as JSON strings, which keeps full decimal precision.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use tracing::debug;

use super::PriceSource;
use crate::types::{Quote, WagerError};

const BASE_URL: &str = "https://api.binance.com/api/v3";
const SOURCE_NAME: &str = "binance";

/// Shape of `/api/v3/ticker/price` for a single symbol.
#[derive(Debug, Deserialize)]
struct TickerResponse {
    symbol: String,
    price: String,
}

/// Binance price source.
pub struct BinanceSource {
    http: Client,
}

impl BinanceSource {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("BOOKIE/0.1.0")
            .build()
            .context("Failed to build HTTP client for Binance")?;

        Ok(Self { http })
    }

    fn unavailable(instrument: &str, reason: impl std::fmt::Display) -> WagerError {
        WagerError::PriceUnavailable {
            instrument: instrument.to_string(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl PriceSource for BinanceSource {
    async fn fetch(&self, instrument: &str) -> Result<Quote, WagerError> {
        let url = format!(
            "{BASE_URL}/ticker/price?symbol={}",
            urlencoding::encode(instrument),
        );

        debug!(url = %url, "Fetching Binance ticker");

        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::unavailable(instrument, e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Self::unavailable(instrument, format!("HTTP {status}: {body}")));
        }

        let ticker: TickerResponse = resp
            .json()
            .await
            .map_err(|e| Self::unavailable(instrument, e))?;

        let price = Decimal::from_str(&ticker.price).map_err(|e| {
            Self::unavailable(instrument, format!("unparseable price {:?}: {e}", ticker.price))
        })?;

        Ok(Quote {
            instrument: ticker.symbol,
            price,
            source: SOURCE_NAME.to_string(),
            fetched_at: Utc::now(),
        })
    }

    fn name(&self) -> &str {
        SOURCE_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
