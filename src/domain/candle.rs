use {
    serde::{Deserialize, Serialize},
    std::ops::Deref,
    strum_macros::{Display, EnumIter},
};

/// The numeric columns of an OHLC record. `date` is deliberately absent: it is never scaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
#[strum(serialize_all = "camelCase")]
pub enum OhlcField {
    Open,
    High,
    Low,
    Close,
    WeightedAverage,
    Volume,
    QuoteVolume,
}

/// One candle as delivered by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OhlcRecord {
    /// Candle open time, unix seconds. Zero marks a malformed record.
    pub date: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub weighted_average: f64,
    pub volume: f64,
    pub quote_volume: f64,
}

impl OhlcRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        date: i64,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        weighted_average: f64,
        volume: f64,
        quote_volume: f64,
    ) -> Self {
        Self {
            date,
            open,
            high,
            low,
            close,
            weighted_average,
            volume,
            quote_volume,
        }
    }

    /// A record with every numeric field set to `value`.
    pub fn splat(date: i64, value: f64) -> Self {
        Self::new(date, value, value, value, value, value, value, value)
    }

    pub fn is_valid(&self) -> bool {
        self.date != 0
    }

    pub fn get(&self, field: OhlcField) -> f64 {
        match field {
            OhlcField::Open => self.open,
            OhlcField::High => self.high,
            OhlcField::Low => self.low,
            OhlcField::Close => self.close,
            OhlcField::WeightedAverage => self.weighted_average,
            OhlcField::Volume => self.volume,
            OhlcField::QuoteVolume => self.quote_volume,
        }
    }

    pub fn set(&mut self, field: OhlcField, value: f64) {
        match field {
            OhlcField::Open => self.open = value,
            OhlcField::High => self.high = value,
            OhlcField::Low => self.low = value,
            OhlcField::Close => self.close = value,
            OhlcField::WeightedAverage => self.weighted_average = value,
            OhlcField::Volume => self.volume = value,
            OhlcField::QuoteVolume => self.quote_volume = value,
        }
    }
}

/// An OHLC record whose numeric fields live in scaled space. `date` is untouched.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScaledRecord(pub OhlcRecord);

impl Deref for ScaledRecord {
    type Target = OhlcRecord;

    fn deref(&self) -> &OhlcRecord {
        &self.0
    }
}
