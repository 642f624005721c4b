mod perf;
pub mod time_utils;

pub use time_utils::{
    TimeUtils, encode_folder_timestamp, epoch_sec_to_utc, format_duration, now_unix, now_utc,
    parse_folder_timestamp,
};
