// Core modules
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod models;
pub mod pipeline;
pub mod utils;

pub use config::{DataLayout, PipelineConfig};
pub use engine::{PaperTradingClient, Pipeline, TradingClient, cancel_on_ctrl_c};
pub use models::{DriftBackend, ModelBackend, ModelRegistry};

use {
    clap::Parser,
    domain::Interval,
    std::path::PathBuf,
};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory. Defaults to `data/<SYMBOL>`
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Base asset, e.g. ETH
    #[arg(long, default_value = config::constants::DEFAULT_SYMBOL)]
    pub symbol: String,

    /// Quote asset, e.g. USDT
    #[arg(long = "quote", default_value = config::constants::DEFAULT_QUOTE_SYMBOL)]
    pub quote_symbol: String,

    /// Interval to run; repeat for several. All intervals when omitted
    #[arg(long = "interval", value_enum)]
    pub intervals: Vec<Interval>,

    /// Records per inference window
    #[arg(long)]
    pub lookback: Option<usize>,

    /// Quote amount per paper order
    #[arg(long)]
    pub paper_amount: Option<f64>,

    /// Log signals without placing paper orders
    #[arg(long, default_value_t = false)]
    pub no_trading: bool,
}

impl Cli {
    /// Overlays the command line on the default configuration.
    pub fn into_config(self) -> PipelineConfig {
        let mut config = PipelineConfig::default();
        config.layout = DataLayout::new(
            self.root
                .unwrap_or_else(|| PathBuf::from("data").join(self.symbol.to_uppercase())),
        );
        config.symbol = self.symbol;
        config.quote_symbol = self.quote_symbol;
        if !self.intervals.is_empty() {
            let mut intervals = self.intervals;
            intervals.sort();
            intervals.dedup();
            config.intervals = intervals;
        }
        if let Some(lookback) = self.lookback {
            config.hyper_params.look_back = lookback;
        }
        if let Some(amount) = self.paper_amount {
            config.trading.order_amount = amount;
        }
        config.trading.enabled = !self.no_trading;
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_overrides_defaults() {
        let cli = Cli::parse_from([
            "candle-cast",
            "--symbol",
            "btc",
            "--interval",
            "oneDay",
            "--interval",
            "fiveMinute",
            "--interval",
            "oneDay",
            "--lookback",
            "7",
            "--no-trading",
        ]);
        let config = cli.into_config();
        assert_eq!(config.intervals, vec![Interval::FiveMinute, Interval::OneDay]);
        assert_eq!(config.lookback(), 7);
        assert_eq!(config.layout.root(), std::path::Path::new("data/BTC"));
        assert!(!config.trading.enabled);
        assert_eq!(config.quote_symbol, config::constants::DEFAULT_QUOTE_SYMBOL);
    }
}
