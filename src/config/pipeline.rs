//! The immutable runtime configuration handed to every agent.

use {
    crate::{
        config::{DataLayout, constants},
        domain::Interval,
        utils::TimeUtils,
    },
    anyhow::{Result, bail},
    serde::{Deserialize, Serialize},
    std::{path::PathBuf, time::Duration},
    strum::IntoEnumIterator,
};

/// Training hyper-parameters, passed opaquely to the model backend and stored
/// next to every artifact as `HyperParameters.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HyperParameters {
    pub neurons: usize,
    pub activation_function: String,
    pub loss_function: String,
    pub optimizer: String,
    pub dropout: f64,
    pub batch_size: usize,
    pub epochs: usize,
    pub look_back: usize,
    pub look_forward: usize,
    pub random_seed: u64,
}

impl Default for HyperParameters {
    fn default() -> Self {
        use constants::hyper as H;
        Self {
            neurons: H::NEURONS,
            activation_function: H::ACTIVATION.to_string(),
            loss_function: H::LOSS.to_string(),
            optimizer: H::OPTIMIZER.to_string(),
            dropout: H::DROPOUT,
            batch_size: H::BATCH_SIZE,
            epochs: H::EPOCHS,
            look_back: H::LOOKBACK,
            look_forward: H::LOOKFORWARD,
            random_seed: H::RANDOM_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TradingSettings {
    pub enabled: bool,
    pub signal_threshold_pct: f64,
    pub order_amount: f64,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub layout: DataLayout,
    pub symbol: String,
    pub quote_symbol: String,
    pub intervals: Vec<Interval>,
    pub hyper_params: HyperParameters,

    /// Maximum records per upstream fetch call.
    pub fetch_batch_size: i64,
    /// Records per call when pulling training history.
    pub training_batch_size: i64,
    pub first_run_safety_margin_secs: i64,
    /// `None` polls at the smallest configured interval.
    pub ingest_poll_secs: Option<u64>,
    pub error_backoff_secs: u64,

    pub file_expiration_secs: i64,
    pub retention_secs: i64,
    pub retention_period_secs: u64,

    pub headroom_pct: f64,
    pub model_retrain_delay_hours: i64,
    pub training_history_days: i64,
    pub retrain_check_secs: u64,
    pub training_request_cooldown_secs: i64,
    pub registry_scan_secs: u64,

    pub channel_poll_ms: u64,
    pub trading: TradingSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        use constants::{channel, ingest, persistence, registry, trading, training};
        Self {
            layout: DataLayout::new(PathBuf::from("data").join(constants::DEFAULT_SYMBOL)),
            symbol: constants::DEFAULT_SYMBOL.to_string(),
            quote_symbol: constants::DEFAULT_QUOTE_SYMBOL.to_string(),
            intervals: Interval::iter().collect(),
            hyper_params: HyperParameters::default(),
            fetch_batch_size: ingest::FETCH_BATCH_SIZE,
            training_batch_size: training::TRAINING_BATCH_SIZE,
            first_run_safety_margin_secs: ingest::FIRST_RUN_SAFETY_MARGIN_SECS,
            ingest_poll_secs: None,
            error_backoff_secs: ingest::ERROR_BACKOFF_SECS,
            file_expiration_secs: persistence::FILE_EXPIRATION_SECS,
            retention_secs: persistence::RETENTION_SECS,
            retention_period_secs: persistence::RETENTION_PERIOD_SECS,
            headroom_pct: constants::SCALER_HEADROOM_PCT,
            model_retrain_delay_hours: training::MODEL_RETRAIN_DELAY_HOURS,
            training_history_days: training::HISTORY_DAYS,
            retrain_check_secs: training::CHECK_PERIOD_SECS,
            training_request_cooldown_secs: training::REQUEST_COOLDOWN_SECS,
            registry_scan_secs: registry::SCAN_PERIOD_SECS,
            channel_poll_ms: channel::POLL_BACKOFF_MS,
            trading: TradingSettings {
                enabled: true,
                signal_threshold_pct: trading::SIGNAL_THRESHOLD_PCT,
                order_amount: trading::ORDER_AMOUNT,
            },
        }
    }
}

impl PipelineConfig {
    pub fn lookback(&self) -> usize {
        self.hyper_params.look_back
    }

    pub fn model_max_age_secs(&self) -> i64 {
        self.model_retrain_delay_hours * TimeUtils::S_IN_H
    }

    pub fn channel_backoff(&self) -> Duration {
        Duration::from_millis(self.channel_poll_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_secs)
    }

    /// Ingest polls at the shortest configured interval unless overridden.
    pub fn ingest_poll(&self) -> Duration {
        let secs = self.ingest_poll_secs.unwrap_or_else(|| {
            self.intervals
                .iter()
                .map(|i| i.secs() as u64)
                .min()
                .unwrap_or(TimeUtils::S_IN_5_MIN as u64)
        });
        Duration::from_secs(secs)
    }

    /// Rejects configurations that would make an agent misbehave; called once at startup.
    pub fn validate(&self) -> Result<()> {
        if self.intervals.is_empty() {
            bail!("at least one interval must be configured");
        }
        if self.hyper_params.look_back == 0 {
            bail!("lookback must be at least 1");
        }
        if self.hyper_params.look_forward == 0 {
            bail!("lookforward must be at least 1");
        }
        if self.fetch_batch_size <= 0 || self.training_batch_size <= 0 {
            bail!("fetch batch sizes must be positive");
        }
        if self.file_expiration_secs <= 0 {
            bail!("file expiration must be positive");
        }
        if self.retention_secs <= 0 {
            bail!("retention must be positive");
        }
        if self.retention_secs < self.file_expiration_secs {
            bail!(
                "retention ({}s) must be at least the file rotation period ({}s)",
                self.retention_secs,
                self.file_expiration_secs
            );
        }
        if !(0.0..=1.0).contains(&self.headroom_pct) {
            bail!("headroom must be a fraction in [0, 1], got {}", self.headroom_pct);
        }
        if self.model_retrain_delay_hours <= 0 {
            bail!("model retrain delay must be positive");
        }
        Ok(())
    }
}
