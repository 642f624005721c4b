use crate::utils::TimeUtils;

// Top Level Constants
pub const DEFAULT_SYMBOL: &str = "ETH";
pub const DEFAULT_QUOTE_SYMBOL: &str = "USDT";

/// Extra margin above the observed maximum when building a scaler (5%).
pub const SCALER_HEADROOM_PCT: f64 = 0.05;

pub mod channel {
    /// Backoff between empty polls of a channel.
    pub const POLL_BACKOFF_MS: u64 = 250;
    /// How often a consumer logs the depth of the channel it drains (when DF.log_channel_depth).
    pub const DEPTH_LOG_EVERY: u64 = 500;
}

pub mod ingest {
    /// Maximum records requested per fetch call.
    pub const FETCH_BATCH_SIZE: i64 = 1000;
    /// Subtracted (with one interval) from "now" when no marker exists yet.
    pub const FIRST_RUN_SAFETY_MARGIN_SECS: i64 = 60;
    pub const ERROR_BACKOFF_SECS: u64 = 5;
}

pub mod persistence {
    use super::TimeUtils;

    /// Age after which the active CSV file in a directory is rotated (5 days).
    pub const FILE_EXPIRATION_SECS: i64 = TimeUtils::S_IN_D * 5;
    /// Files older than this are pruned by the retention agent (1 week).
    pub const RETENTION_SECS: i64 = TimeUtils::S_IN_W;
    /// How often the retention agent runs.
    pub const RETENTION_PERIOD_SECS: u64 = TimeUtils::S_IN_D as u64;
}

pub mod training {
    /// An interval whose newest model is older than this is retrained.
    pub const MODEL_RETRAIN_DELAY_HOURS: i64 = 24;
    /// How far back the scheduler fetches training history.
    pub const HISTORY_DAYS: i64 = 60;
    /// How often the scheduler checks model freshness.
    pub const CHECK_PERIOD_SECS: u64 = 60 * 60;
    /// Minimum gap between two training requests for the same interval.
    pub const REQUEST_COOLDOWN_SECS: i64 = 6 * 60 * 60;
    pub const TRAINING_BATCH_SIZE: i64 = 500;
}

pub mod registry {
    /// Re-scan period of the model directory while waiting for a new artifact.
    pub const SCAN_PERIOD_SECS: u64 = 15;
}

pub mod trading {
    /// Forecast move (fraction of the reference close) needed before acting.
    pub const SIGNAL_THRESHOLD_PCT: f64 = 0.005;
    /// Quote currency amount per paper order.
    pub const ORDER_AMOUNT: f64 = 100.0;
}

pub mod hyper {
    pub const NEURONS: usize = 20;
    pub const ACTIVATION: &str = "linear";
    pub const LOSS: &str = "mae";
    pub const OPTIMIZER: &str = "adam";
    pub const DROPOUT: f64 = 0.25;
    pub const BATCH_SIZE: usize = 32;
    pub const EPOCHS: usize = 50;
    pub const LOOKBACK: usize = 10;
    pub const LOOKFORWARD: usize = 1;
    pub const RANDOM_SEED: u64 = 42;
}
