use {
    anyhow::{Context, Result, bail},
    chrono::{DateTime, Datelike, NaiveDate, TimeZone, Timelike, Utc},
    std::time::{Duration, SystemTime, UNIX_EPOCH},
};

pub struct TimeUtils;

impl TimeUtils {
    pub const S_IN_MIN: i64 = 60;
    pub const S_IN_5_MIN: i64 = Self::S_IN_MIN * 5;
    pub const S_IN_15_MIN: i64 = Self::S_IN_MIN * 15;
    pub const S_IN_30_MIN: i64 = Self::S_IN_MIN * 30;
    pub const S_IN_H: i64 = Self::S_IN_MIN * 60;
    pub const S_IN_2_H: i64 = Self::S_IN_H * 2;
    pub const S_IN_4_H: i64 = Self::S_IN_H * 4;
    pub const S_IN_D: i64 = Self::S_IN_H * 24;
    pub const S_IN_W: i64 = Self::S_IN_D * 7;
    pub const STANDARD_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
}

/// Current unix time in whole seconds. Clock errors collapse to 0 rather than panic.
pub fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

pub fn epoch_sec_to_utc(epoch_sec: i64) -> String {
    match DateTime::from_timestamp(epoch_sec, 0) {
        Some(dt) => dt.format(TimeUtils::STANDARD_TIME_FORMAT).to_string(),
        None => format!("<invalid {}>", epoch_sec),
    }
}

/// Encode a model creation time as a folder name: `M_D_YYYY_h_m_s`, unpadded.
pub fn encode_folder_timestamp(dt: &DateTime<Utc>) -> String {
    format!(
        "{}_{}_{}_{}_{}_{}",
        dt.month(),
        dt.day(),
        dt.year(),
        dt.hour(),
        dt.minute(),
        dt.second()
    )
}

/// Inverse of [`encode_folder_timestamp`].
pub fn parse_folder_timestamp(name: &str) -> Result<DateTime<Utc>> {
    let parts: Vec<&str> = name.split('_').filter(|p| !p.is_empty()).collect();
    if parts.len() != 6 {
        bail!("expected 6 '_' separated fields, found {} in {:?}", parts.len(), name);
    }

    let num = |idx: usize| -> Result<u32> {
        parts[idx]
            .parse::<u32>()
            .with_context(|| format!("field {} of {:?} is not a number", idx, name))
    };

    let year = parts[2]
        .parse::<i32>()
        .with_context(|| format!("year of {:?} is not a number", name))?;
    let date = NaiveDate::from_ymd_opt(year, num(0)?, num(1)?)
        .with_context(|| format!("{:?} is not a calendar date", name))?;
    let naive = date
        .and_hms_opt(num(3)?, num(4)?, num(5)?)
        .with_context(|| format!("{:?} is not a valid time of day", name))?;

    Ok(Utc.from_utc_datetime(&naive))
}

pub fn format_duration(secs: i64) -> String {
    if secs < 60 {
        return format!("{}s", secs);
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("{}m", mins);
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }
    let days = hours / 24;
    format!("{}d {}h", days, hours % 24)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_timestamp_round_trips() {
        let dt = Utc.with_ymd_and_hms(2021, 3, 7, 4, 5, 9).unwrap();
        let name = encode_folder_timestamp(&dt);
        assert_eq!(name, "3_7_2021_4_5_9");
        assert_eq!(parse_folder_timestamp(&name).unwrap(), dt);
    }

    #[test]
    fn folder_timestamp_rejects_garbage() {
        assert!(parse_folder_timestamp("latest").is_err());
        assert!(parse_folder_timestamp("13_1_2021_0_0_0").is_err());
        assert!(parse_folder_timestamp("1_1_2021_0_0").is_err());
    }

    #[test]
    fn week_is_seven_days() {
        assert_eq!(TimeUtils::S_IN_W, 604_800);
        assert_eq!(crate::config::constants::persistence::RETENTION_SECS, TimeUtils::S_IN_W);
    }

    #[test]
    fn durations_are_compact() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(3 * 3600 + 5), "3h");
        assert_eq!(format_duration(2 * 86400 + 7200), "2d 2h");
    }
}
