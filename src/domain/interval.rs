use {
    crate::utils::TimeUtils,
    serde::{Deserialize, Serialize},
    strum_macros::{Display, EnumIter, EnumString},
};

/// A tradable candle sampling period.
///
/// The camelCase name is the on-disk encoding: model and marker directories,
/// JSON map keys and min-max snapshot filenames all use it.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumIter,
    EnumString,
    clap::ValueEnum,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase")]
#[value(rename_all = "camelCase")]
pub enum Interval {
    FiveMinute,
    FifteenMinute,
    ThirtyMinute,
    TwoHour,
    FourHour,
    OneDay,
}

impl Interval {
    pub const fn secs(self) -> i64 {
        match self {
            Self::FiveMinute => TimeUtils::S_IN_5_MIN,
            Self::FifteenMinute => TimeUtils::S_IN_15_MIN,
            Self::ThirtyMinute => TimeUtils::S_IN_30_MIN,
            Self::TwoHour => TimeUtils::S_IN_2_H,
            Self::FourHour => TimeUtils::S_IN_4_H,
            Self::OneDay => TimeUtils::S_IN_D,
        }
    }

    /// Binance-style shorthand, for log lines.
    pub fn short_name(self) -> &'static str {
        match self {
            Self::FiveMinute => "5m",
            Self::FifteenMinute => "15m",
            Self::ThirtyMinute => "30m",
            Self::TwoHour => "2h",
            Self::FourHour => "4h",
            Self::OneDay => "1d",
        }
    }
}
