use {
    anyhow::{Context, Result},
    binance_sdk::{
        config::ConfigurationRestApi,
        errors::ConnectorError,
        spot::{
            SpotRestApi,
            rest_api::{KlinesIntervalEnum, KlinesItemInner, KlinesParams, RestApi},
        },
    },
    std::convert::TryFrom,
    thiserror::Error,
};

use crate::{
    config::{BINANCE, DF},
    data::GlobalRateLimiter,
    domain::{Interval, OhlcRecord},
    utils::epoch_sec_to_utc,
};

const MS_IN_S: i64 = 1000;

pub fn klines_interval(interval: Interval) -> KlinesIntervalEnum {
    match interval {
        Interval::FiveMinute => KlinesIntervalEnum::Interval5m,
        Interval::FifteenMinute => KlinesIntervalEnum::Interval15m,
        Interval::ThirtyMinute => KlinesIntervalEnum::Interval30m,
        Interval::TwoHour => KlinesIntervalEnum::Interval2h,
        Interval::FourHour => KlinesIntervalEnum::Interval4h,
        Interval::OneDay => KlinesIntervalEnum::Interval1d,
    }
}

/// One kline row as returned by the spot REST API, numeric strings already parsed.
#[derive(Debug, PartialEq)]
pub struct BNKline {
    pub open_timestamp_ms: i64,
    pub open_price: Option<f64>,
    pub high_price: Option<f64>,
    pub low_price: Option<f64>,
    pub close_price: Option<f64>,
    pub base_asset_volume: Option<f64>,
    pub quote_asset_volume: Option<f64>,
}

#[derive(Debug, Error)]
pub enum BNKlineError {
    #[error("kline row too short")]
    InvalidLength,
    #[error("kline field {0} has an unexpected type")]
    InvalidType(&'static str),
    #[error("Binance API connection failed: {0}")]
    ConnectionFailed(String),
}

fn parse_numeric(item: Option<KlinesItemInner>) -> Option<f64> {
    match item? {
        KlinesItemInner::String(s) => s.parse::<f64>().ok(),
        KlinesItemInner::Integer(i) => Some(i as f64),
        _ => None,
    }
}

impl TryFrom<Vec<KlinesItemInner>> for BNKline {
    type Error = BNKlineError;

    fn try_from(row: Vec<KlinesItemInner>) -> Result<Self, Self::Error> {
        let mut items = row.into_iter();
        let open_timestamp_ms = match items.next().ok_or(BNKlineError::InvalidLength)? {
            KlinesItemInner::Integer(ms) => ms,
            _ => return Err(BNKlineError::InvalidType("open_time")),
        };

        let open_price = parse_numeric(items.next());
        let high_price = parse_numeric(items.next());
        let low_price = parse_numeric(items.next());
        let close_price = parse_numeric(items.next());
        let base_asset_volume = parse_numeric(items.next());
        let _close_time = items.next();
        let quote_asset_volume = parse_numeric(items.next());

        Ok(BNKline {
            open_timestamp_ms,
            open_price,
            high_price,
            low_price,
            close_price,
            base_asset_volume,
            quote_asset_volume,
        })
    }
}

impl From<BNKline> for OhlcRecord {
    fn from(bn: BNKline) -> Self {
        let close = bn.close_price.unwrap_or_default();
        let volume = bn.base_asset_volume.unwrap_or_default();
        let quote_volume = bn.quote_asset_volume.unwrap_or_default();
        // Volume-weighted price over the candle; flat candles fall back to the close
        let weighted_average = if volume > 0.0 {
            quote_volume / volume
        } else {
            close
        };

        OhlcRecord::new(
            bn.open_timestamp_ms / MS_IN_S,
            bn.open_price.unwrap_or_default(),
            bn.high_price.unwrap_or_default(),
            bn.low_price.unwrap_or_default(),
            close,
            weighted_average,
            volume,
            quote_volume,
        )
    }
}

fn convert_klines(data: Vec<Vec<KlinesItemInner>>) -> Result<Vec<BNKline>, BNKlineError> {
    data.into_iter().map(BNKline::try_from).collect()
}

fn configure_binance_client() -> Result<RestApi> {
    let config = BINANCE.client;
    let rest_conf = ConfigurationRestApi::builder()
        .timeout(config.timeout_ms)
        .retries(config.retries)
        .backoff(config.backoff_ms)
        .build()?;
    Ok(SpotRestApi::production(rest_conf))
}

async fn fetch_page(
    rest_client: &RestApi,
    params: KlinesParams,
    context: &str,
) -> Result<Vec<Vec<KlinesItemInner>>> {
    match rest_client.klines(params).await {
        Ok(response) => Ok(response.data().await?),
        Err(e) => {
            match e.downcast_ref::<ConnectorError>() {
                Some(ConnectorError::TooManyRequestsError(msg)) => {
                    log::warn!("{} Rate limit exceeded. Please wait and try again. {}", context, msg);
                }
                Some(ConnectorError::RateLimitBanError(msg)) => {
                    log::error!("{} IP address banned due to excessive rate limits. {}", context, msg);
                }
                Some(ConnectorError::NetworkError(msg)) => {
                    log::error!("{} Network error: Check your internet connection. {}", context, msg);
                }
                Some(other) => log::error!("{} Binance connector error: {:?}", context, other),
                None => log::error!("An unexpected error occurred for {}: {:#}", context, e),
            }
            Err(anyhow::Error::new(BNKlineError::ConnectionFailed(e.to_string()))
                .context(format!("Binance API call failed for {}", context)))
        }
    }
}

/// Fetch every kline whose open time lies in `[start_secs, end_secs)`, oldest first,
/// stopping after `max_records`. Pages forward in calls of at most the API limit.
pub async fn load_klines(
    pair: &str,
    interval: Interval,
    start_secs: i64,
    end_secs: i64,
    max_records: i64,
    limiter: &GlobalRateLimiter,
) -> Result<Vec<OhlcRecord>> {
    let rest_client = configure_binance_client()?;
    let context = format!("{}_{}", pair, interval.short_name());
    let endpoint = &BINANCE.klines;

    let mut records: Vec<OhlcRecord> = Vec::new();
    let mut cursor = start_secs;
    let mut pages = 0;

    while cursor < end_secs && (records.len() as i64) < max_records {
        if pages == endpoint.max_pages {
            log::warn!("{} stopped after {} pages at {}", context, pages, epoch_sec_to_utc(cursor));
            break;
        }
        pages += 1;
        let remaining = max_records - records.len() as i64;
        let page_limit = remaining.min(endpoint.klines_limit as i64) as i32;

        if DF.log_fetch_windows {
            log::info!(
                "📡 {} klines [{} .. {}) limit {}",
                context,
                epoch_sec_to_utc(cursor),
                epoch_sec_to_utc(end_secs),
                page_limit
            );
        }

        limiter.acquire(endpoint.kline_call_weight, &context).await;
        let params = KlinesParams::builder(pair.to_string(), klines_interval(interval))
            .limit(page_limit)
            .start_time(Some(cursor * MS_IN_S))
            // Binance treats end_time as inclusive
            .end_time(Some(end_secs * MS_IN_S - 1))
            .build()?;

        let page = fetch_page(&rest_client, params, &context).await?;
        let page_len = page.len();
        let klines = convert_klines(page).with_context(|| format!("{} convert_klines failed", context))?;

        let Some(last_open) = klines.last().map(|k| k.open_timestamp_ms / MS_IN_S) else {
            break;
        };
        records.extend(klines.into_iter().map(OhlcRecord::from));

        if page_len < page_limit as usize {
            break;
        }
        cursor = last_open + interval.secs();
    }

    records.truncate(max_records.max(0) as usize);
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(open_ms: i64, close: &str, volume: &str, quote: &str) -> Vec<KlinesItemInner> {
        vec![
            KlinesItemInner::Integer(open_ms),
            KlinesItemInner::String("1.0".into()),
            KlinesItemInner::String("3.0".into()),
            KlinesItemInner::String("0.5".into()),
            KlinesItemInner::String(close.into()),
            KlinesItemInner::String(volume.into()),
            KlinesItemInner::Integer(open_ms + 299_999),
            KlinesItemInner::String(quote.into()),
        ]
    }

    #[test]
    fn kline_row_becomes_record_in_seconds() {
        let kline = BNKline::try_from(row(1_600_000_200_000, "2.0", "4.0", "10.0")).unwrap();
        let record = OhlcRecord::from(kline);
        assert_eq!(record.date, 1_600_000_200);
        assert_eq!(record.high, 3.0);
        assert_eq!(record.close, 2.0);
        assert_eq!(record.weighted_average, 2.5);
    }

    #[test]
    fn zero_volume_weights_at_close() {
        let kline = BNKline::try_from(row(1_600_000_200_000, "2.0", "0", "0")).unwrap();
        assert_eq!(OhlcRecord::from(kline).weighted_average, 2.0);
    }

    #[test]
    fn row_without_open_time_is_rejected() {
        let err = BNKline::try_from(vec![KlinesItemInner::String("x".into())]).unwrap_err();
        assert!(matches!(err, BNKlineError::InvalidType("open_time")));
        assert!(matches!(BNKline::try_from(vec![]), Err(BNKlineError::InvalidLength)));
    }
}
