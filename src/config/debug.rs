//! Debugging feature flags.

pub struct LogFlags {
    /// Periodically log queue depth / high-water mark while draining a channel.
    pub log_channel_depth: bool,

    /// Activate trace_time macro (for cool scope-level timing)
    pub log_performance: bool,

    /// Log every rotation decision made by the persistence log.
    pub log_rotation: bool,

    /// Log each model hot-swap and every await-next re-arm.
    pub log_model_swaps: bool,

    /// Log each prediction as it is produced.
    pub log_predictions: bool,

    /// Log each fetch window requested from the exchange.
    pub log_fetch_windows: bool,
}

pub const DF: LogFlags = LogFlags {
    log_channel_depth: true,
    log_model_swaps: true,

    log_performance: false,
    log_rotation: false,
    log_predictions: false,
    log_fetch_windows: false,
};
