mod bn_kline;
mod csv_format;
mod json_io;
mod persistence_log;
mod provider;
mod rate_limiter;

pub use {
    bn_kline::{BNKlineError, load_klines},
    csv_format::{CsvRecord, csv_header, csv_line, format_chunk},
    json_io::{load_json, load_marker, save_json_atomic, save_marker},
    persistence_log::PersistenceLog,
    provider::{BinanceProvider, MarketDataProvider},
    rate_limiter::GlobalRateLimiter,
};
