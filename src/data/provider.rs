use anyhow::Result;
use async_trait::async_trait;

use crate::{
    config::BINANCE,
    data::{GlobalRateLimiter, load_klines},
    domain::{Interval, OhlcRecord},
};

/// Abstract interface for fetching market data.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Candles of `symbol`/`quote` on `interval` whose open time lies in
    /// `[start, end)` (unix seconds), oldest first, at most `limit` of them.
    async fn fetch(
        &self,
        symbol: &str,
        quote: &str,
        interval: Interval,
        start: i64,
        end: i64,
        limit: i64,
    ) -> Result<Vec<OhlcRecord>>;
}

pub struct BinanceProvider {
    limiter: GlobalRateLimiter,
}

impl BinanceProvider {
    pub fn new(limiter: GlobalRateLimiter) -> Self {
        Self { limiter }
    }
}

impl Default for BinanceProvider {
    fn default() -> Self {
        Self::new(GlobalRateLimiter::new(BINANCE.weight_limit_minute))
    }
}

#[async_trait]
impl MarketDataProvider for BinanceProvider {
    async fn fetch(
        &self,
        symbol: &str,
        quote: &str,
        interval: Interval,
        start: i64,
        end: i64,
        limit: i64,
    ) -> Result<Vec<OhlcRecord>> {
        let pair = format!("{}{}", symbol, quote).to_uppercase();
        load_klines(&pair, interval, start, end, limit, &self.limiter).await
    }
}
