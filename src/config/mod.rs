//! Configuration module for the pipeline.

mod binance;
mod debug;
mod persistence;
mod pipeline;

// Public
pub mod constants;

// Re-export commonly used items
pub use binance::{BINANCE, BinanceApiConfig};
pub use debug::DF;
pub use persistence::{DataLayout, PERSISTENCE};
pub use pipeline::{HyperParameters, PipelineConfig, TradingSettings};
