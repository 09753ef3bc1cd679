//! CoinGecko simple-price source.
//!
//! Keyless fallback provider. Instruments here are CoinGecko coin ids
//! ("bitcoin", "ethereum"), not exchange symbols.
//!
//! API docs: https://docs.coingecko.com/reference/simple-price
//! Base URL: https://api.coingecko.com/api/v3
//! Rate limit: ~30 req/min on the public tier.

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use super::PriceSource;
use crate::types::{Quote, WagerError};

const BASE_URL: &str = "https://api.coingecko.com/api/v3";
const SOURCE_NAME: &str = "coingecko";
const QUOTE_CURRENCY: &str = "usd";

/// Shape of `/simple/price`: `{"bitcoin": {"usd": 50000.5}}`.
/// The price arrives as a JSON number, extracted via its raw text so
/// no float round-trip touches the digits.
#[derive(Debug, Deserialize)]
struct SimplePriceResponse(HashMap<String, HashMap<String, serde_json::Number>>);

/// CoinGecko price source.
pub struct CoinGeckoSource {
    http: Client,
}

impl CoinGeckoSource {
    pub fn new(timeout_secs: u64) -> anyhow::Result<Self> {
        use anyhow::Context;

        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .user_agent("BOOKIE/0.1.0")
            .build()
            .context("Failed to build HTTP client for CoinGecko")?;

        Ok(Self { http })
    }

    fn unavailable(instrument: &str, reason: impl std::fmt::Display) -> WagerError {
        WagerError::PriceUnavailable {
            instrument: instrument.to_string(),
            reason: reason.to_string(),
        }
    }

    fn decimal_from_number(n: &serde_json::Number) -> Option<Decimal> {
        let raw = n.to_string();
        Decimal::from_str(&raw)
            .or_else(|_| Decimal::from_scientific(&raw))
            .ok()
    }
}

#[async_trait]
impl PriceSource for CoinGeckoSource {
    async fn fetch(&self, instrument: &str) -> Result<Quote, WagerError> {
        let url = format!(
            "{BASE_URL}/simple/price?ids={}&vs_currencies={QUOTE_CURRENCY}",
            urlencoding::encode(instrument),
        );

        debug!(url = %url, "Fetching CoinGecko price");

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

        let prices: SimplePriceResponse = resp
            .json()
            .await
            .map_err(|e| Self::unavailable(instrument, e))?;

        // An unknown id comes back as an empty object, not an error status.
        let number = prices
            .0
            .get(instrument)
            .and_then(|quotes| quotes.get(QUOTE_CURRENCY))
            .ok_or_else(|| Self::unavailable(instrument, "id missing from response"))?;

        let price = Self::decimal_from_number(number)
            .ok_or_else(|| Self::unavailable(instrument, format!("unparseable price {number}")))?;

        Ok(Quote {
            instrument: instrument.to_string(),
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
