//! Price oracle.
//!
//! Defines the `PriceSource` trait and provides implementations for:
//! - Binance — spot ticker, symbols like "BTCUSDT" (default)
//! - CoinGecko — keyless fallback, ids like "bitcoin"
//!
//! `PriceOracle` wraps a source with a short-lived cache. A quote is
//! either fresh-or-fetched or a typed `PriceUnavailable` error; a stale
//! or fabricated price is never returned.

pub mod binance;
pub mod coingecko;

pub use binance::BinanceSource;
pub use coingecko::CoinGeckoSource;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::types::{Quote, WagerError};

/// Abstraction over external price-quote providers.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Fetch the current quote for an instrument. Network failures,
    /// non-success responses, and malformed payloads all surface as
    /// `PriceUnavailable`.
    async fn fetch(&self, instrument: &str) -> Result<Quote, WagerError>;

    /// Source name for logging and identification.
    fn name(&self) -> &str;
}

/// Caching front for a [`PriceSource`].
///
/// The cache is last-write-wins: concurrent fetches for the same
/// instrument may both hit the provider, which only costs an extra
/// request, never correctness.
pub struct PriceOracle {
    source: Arc<dyn PriceSource>,
    cache: Mutex<HashMap<String, Quote>>,
    ttl: chrono::Duration,
}

impl PriceOracle {
    pub fn new(source: Arc<dyn PriceSource>, cache_ttl_secs: u64) -> Self {
        Self {
            source,
            cache: Mutex::new(HashMap::new()),
            ttl: chrono::Duration::seconds(cache_ttl_secs as i64),
        }
    }

    /// Current quote for `instrument`, served from cache while fresh.
    /// Errors are propagated and never cached.
    pub async fn quote(&self, instrument: &str) -> Result<Quote, WagerError> {
        {
            let cache = self.cache.lock().await;
            if let Some(cached) = cache.get(instrument) {
                if cached.age() < self.ttl {
                    debug!(instrument, price = %cached.price, "Quote served from cache");
                    return Ok(cached.clone());
                }
            }
        }

        let quote = self.source.fetch(instrument).await?;
        debug!(instrument, price = %quote.price, source = %quote.source, "Quote fetched");

        let mut cache = self.cache.lock().await;
        cache.insert(instrument.to_string(), quote.clone());
        Ok(quote)
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
