//! Pulls closed candles from the exchange and feeds the raw records channel.
//!
//! Per interval, a durable marker holds the open time to resume from. It only
//! moves forward after the fetched records are persisted and forwarded, so a
//! crash re-delivers at most one batch.

use {
    super::{messages::IntervalRecord, sleep_or_cancel},
    crate::{
        config::PipelineConfig,
        data::{MarketDataProvider, PersistenceLog, load_marker, save_marker},
        domain::{Interval, OhlcRecord},
        pipeline::Channel,
        utils::{epoch_sec_to_utc, now_unix},
    },
    anyhow::{Context, Result},
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

/// `[start, end)` of the next request: at most `batch` candles, never past `now`.
pub fn fetch_window(start: i64, now: i64, interval: Interval, batch: i64) -> (i64, i64) {
    let end = (start + batch * interval.secs()).min(now);
    (start, end)
}

/// First-run marker: the open time of the candle that started at least one
/// interval plus `margin` before `now`. Always on an interval boundary.
pub fn seed_marker(now: i64, interval: Interval, margin: i64) -> i64 {
    let secs = interval.secs();
    (now - secs - margin).div_euclid(secs) * secs
}

/// Where the marker moves after a fetch of `[start, end)` that yielded `forwarded`.
/// `None` leaves it where it is.
pub fn next_marker(forwarded: &[OhlcRecord], end: i64, now: i64, interval: Interval) -> Option<i64> {
    match forwarded.last() {
        Some(last) => Some(last.date + interval.secs()),
        // Every candle that could open before `end` has closed: the gap is real
        None if end + interval.secs() <= now => Some(end),
        None => None,
    }
}

/// Valid, closed candles inside the request window, ordered and de-duplicated.
pub fn closed_candles(
    mut records: Vec<OhlcRecord>,
    start: i64,
    now: i64,
    interval: Interval,
) -> Vec<OhlcRecord> {
    records.retain(|r| r.is_valid() && r.date >= start && r.date + interval.secs() <= now);
    records.sort_by_key(|r| r.date);
    records.dedup_by_key(|r| r.date);
    records
}

pub struct IngestAgent {
    config: Arc<PipelineConfig>,
    provider: Arc<dyn MarketDataProvider>,
    log: PersistenceLog,
    output: Channel<IntervalRecord>,
}

impl IngestAgent {
    pub fn new(
        config: Arc<PipelineConfig>,
        provider: Arc<dyn MarketDataProvider>,
        output: Channel<IntervalRecord>,
    ) -> Self {
        let log = PersistenceLog::new(config.file_expiration_secs);
        Self {
            config,
            provider,
            log,
            output,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        log::info!(
            "📥 Ingest started for {}{} on {} interval(s)",
            self.config.symbol,
            self.config.quote_symbol,
            self.config.intervals.len()
        );

        'outer: while !cancel.is_cancelled() {
            for &interval in &self.config.intervals {
                if cancel.is_cancelled() || self.output.is_completed() {
                    break 'outer;
                }
                match self.ingest_interval(interval, &cancel).await {
                    Ok(0) => {}
                    Ok(n) => log::info!("📥 {} new {} candle(s)", n, interval),
                    Err(e) => {
                        log::error!("Ingest for {} failed: {:#}", interval, e);
                        if !sleep_or_cancel(&cancel, self.config.error_backoff()).await {
                            break 'outer;
                        }
                    }
                }
            }
            if !sleep_or_cancel(&cancel, self.config.ingest_poll()).await {
                break;
            }
        }

        self.output.complete();
        log::info!("📥 Ingest stopped");
    }

    /// One fetch for `interval`. Returns how many records were forwarded.
    pub async fn ingest_interval(
        &self,
        interval: Interval,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let layout = &self.config.layout;
        let marker_path = layout.last_timestamp_path(interval);
        let now = now_unix();

        let (start, first_run) = match load_marker(&marker_path, interval)? {
            Some(start) => (start, false),
            None => (
                seed_marker(now, interval, self.config.first_run_safety_margin_secs),
                true,
            ),
        };
        let (start, end) = fetch_window(start, now, interval, self.config.fetch_batch_size);
        if end <= start {
            return Ok(0);
        }

        let fetched = tokio::select! {
            _ = cancel.cancelled() => return Ok(0),
            fetched = self.provider.fetch(
                &self.config.symbol,
                &self.config.quote_symbol,
                interval,
                start,
                end,
                self.config.fetch_batch_size,
            ) => fetched.with_context(|| {
                format!(
                    "fetching {} [{} .. {})",
                    interval,
                    epoch_sec_to_utc(start),
                    epoch_sec_to_utc(end)
                )
            })?,
        };

        let records = closed_candles(fetched, start, now, interval);
        if !records.is_empty() {
            self.log
                .append_async(layout.raw_dir(), records.clone())
                .await?;
            for record in &records {
                self.output
                    .put(IntervalRecord {
                        interval,
                        record: *record,
                    })
                    .context("forwarding raw record")?;
            }
        }

        match next_marker(&records, end, now, interval) {
            Some(next) => save_marker(&marker_path, interval, next)?,
            // Later polls resume from the seed instead of re-seeding from a new `now`
            None if first_run => save_marker(&marker_path, interval, start)?,
            None => {}
        }
        Ok(records.len())
    }
}
