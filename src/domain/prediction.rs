use {
    crate::domain::Interval,
    serde::{Deserialize, Serialize},
};

/// A forecast close for the candle following a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prediction {
    /// De-scaled forecast close.
    pub close: f64,
    /// Last input timestamp + interval.
    pub unix_time: i64,
    pub interval: Interval,
    /// De-scaled close of the window's last record.
    pub reference_close: f64,
}

impl Prediction {
    /// Relative move implied by the forecast, e.g. `0.01` for +1%.
    pub fn expected_change(&self) -> f64 {
        if self.reference_close.abs() > f64::EPSILON {
            (self.close - self.reference_close) / self.reference_close
        } else {
            0.0
        }
    }
}
