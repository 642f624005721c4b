use {
    crate::{
        domain::{Interval, OhlcRecord, ScaledRecord},
        pipeline::Scaler,
    },
    std::sync::Arc,
};

/// A raw candle tagged with the interval it was fetched on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntervalRecord {
    pub interval: Interval,
    pub record: OhlcRecord,
}

/// Exactly `lookback` consecutive scaled records of one interval, oldest first.
/// Every record was scaled by `scaler`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledWindow {
    pub interval: Interval,
    pub records: Vec<ScaledRecord>,
    pub scaler: Arc<Scaler>,
}

impl ScaledWindow {
    pub fn last(&self) -> Option<&ScaledRecord> {
        self.records.last()
    }

    /// Open time of the candle following the window.
    pub fn target_time(&self) -> Option<i64> {
        self.last().map(|r| r.date + self.interval.secs())
    }
}

/// Raw history handed from the scheduler to the trainer.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingBatch {
    pub interval: Interval,
    pub records: Vec<OhlcRecord>,
}
