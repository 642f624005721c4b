//! Binance spot REST settings used by the kline loader.

/// Retry policy handed to the SDK's REST configuration.
#[derive(Debug, Clone, Copy)]
pub struct BinanceApiConfig {
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

/// `GET /api/v3/klines` constraints.
pub struct KlineEndpoint {
    /// Hard cap on rows per call.
    pub klines_limit: i32,
    /// Request weight of one call at `klines_limit`.
    pub kline_call_weight: u32,
    /// Upper bound on pages per `load_klines` call, in case the cursor stalls.
    pub max_pages: usize,
}

pub struct BinanceConfig {
    /// Request weight budget per rolling minute, shared by every fetch.
    pub weight_limit_minute: u32,
    pub klines: KlineEndpoint,
    pub client: BinanceApiConfig,
}

pub const BINANCE: BinanceConfig = BinanceConfig {
    weight_limit_minute: 6000,
    klines: KlineEndpoint {
        klines_limit: 1000,
        kline_call_weight: 2,
        max_pages: 500,
    },
    client: BinanceApiConfig {
        timeout_ms: 5000,
        retries: 5,
        backoff_ms: 5000,
    },
};
