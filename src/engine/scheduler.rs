//! Decides when an interval needs a new model and gathers its training history.

use {
    super::{messages::TrainingBatch, sleep_or_cancel},
    crate::{
        config::PipelineConfig,
        data::{MarketDataProvider, format_chunk},
        domain::{Interval, OhlcRecord},
        engine::ingest::closed_candles,
        models::ModelRegistry,
        pipeline::Channel,
        utils::{TimeUtils, epoch_sec_to_utc, format_duration, now_unix},
    },
    anyhow::{Context, Result},
    std::{collections::HashMap, fs, sync::Arc, time::Duration},
    tokio_util::sync::CancellationToken,
};

/// Splits `[start, end)` into consecutive requests of at most `batch` candles.
pub fn history_chunks(start: i64, end: i64, interval: Interval, batch: i64) -> Vec<(i64, i64)> {
    let step = batch.max(1) * interval.secs();
    let mut chunks = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let chunk_end = (cursor + step).min(end);
        chunks.push((cursor, chunk_end));
        cursor = chunk_end;
    }
    chunks
}

pub struct TrainingScheduler {
    config: Arc<PipelineConfig>,
    provider: Arc<dyn MarketDataProvider>,
    registry: Arc<ModelRegistry>,
    output: Channel<TrainingBatch>,
    last_request: HashMap<Interval, i64>,
}

impl TrainingScheduler {
    pub fn new(
        config: Arc<PipelineConfig>,
        provider: Arc<dyn MarketDataProvider>,
        registry: Arc<ModelRegistry>,
        output: Channel<TrainingBatch>,
    ) -> Self {
        Self {
            config,
            provider,
            registry,
            output,
            last_request: HashMap::new(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        log::info!(
            "🗓️ Training scheduler started (retrain after {}h)",
            self.config.model_retrain_delay_hours
        );

        while !cancel.is_cancelled() {
            let intervals = self.config.intervals.clone();
            for interval in intervals {
                if cancel.is_cancelled() {
                    break;
                }
                if let Err(e) = self.check_interval(interval, &cancel).await {
                    log::error!("Training data request for {} failed: {:#}", interval, e);
                }
            }
            if !sleep_or_cancel(&cancel, Duration::from_secs(self.config.retrain_check_secs)).await {
                break;
            }
        }

        self.output.complete();
        log::info!("🗓️ Training scheduler stopped");
    }

    /// Queues a training batch for `interval` unless it has a fresh model or
    /// was requested recently. Returns whether a batch was queued.
    pub async fn check_interval(
        &mut self,
        interval: Interval,
        cancel: &CancellationToken,
    ) -> Result<bool> {
        if let Some(fresh) = self
            .registry
            .latest_if_fresh(interval, self.config.model_max_age_secs())?
        {
            log::debug!("{} is fresh, no retraining", fresh);
            return Ok(false);
        }

        let now = now_unix();
        if let Some(&requested) = self.last_request.get(&interval) {
            let since = now - requested;
            if since < self.config.training_request_cooldown_secs {
                log::debug!(
                    "{} training requested {} ago, waiting",
                    interval,
                    format_duration(since)
                );
                return Ok(false);
            }
        }

        let Some(records) = self.fetch_history(interval, now, cancel).await? else {
            return Ok(false);
        };
        let needed = self.config.hyper_params.look_back + self.config.hyper_params.look_forward;
        if records.len() < needed {
            log::warn!(
                "Only {} {} candles of history, {} needed to train",
                records.len(),
                interval,
                needed
            );
            return Ok(false);
        }

        self.write_training_csv(interval, &records).await?;
        log::info!("🗓️ Queuing {} {} candles for training", records.len(), interval);
        self.output.put(TrainingBatch { interval, records })?;
        self.last_request.insert(interval, now);
        Ok(true)
    }

    /// `None` if cancelled part way.
    async fn fetch_history(
        &self,
        interval: Interval,
        now: i64,
        cancel: &CancellationToken,
    ) -> Result<Option<Vec<OhlcRecord>>> {
        let start = now - self.config.training_history_days * TimeUtils::S_IN_D;
        let chunks = history_chunks(start, now, interval, self.config.training_batch_size);
        log::info!(
            "🗓️ Fetching {} history since {} in {} batch(es)",
            interval,
            epoch_sec_to_utc(start),
            chunks.len()
        );

        let mut history = Vec::new();
        for (chunk_start, chunk_end) in chunks {
            let fetched = tokio::select! {
                _ = cancel.cancelled() => return Ok(None),
                fetched = self.provider.fetch(
                    &self.config.symbol,
                    &self.config.quote_symbol,
                    interval,
                    chunk_start,
                    chunk_end,
                    self.config.training_batch_size,
                ) => fetched.with_context(|| format!("fetching {} training batch", interval))?,
            };
            history.extend(fetched);
        }
        Ok(Some(closed_candles(history, start, now, interval)))
    }

    async fn write_training_csv(&self, interval: Interval, records: &[OhlcRecord]) -> Result<()> {
        let path = self.config.layout.training_data_path(interval);
        let text = format_chunk(records, true);
        tokio::task::spawn_blocking(move || -> Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&path, text).with_context(|| format!("writing {}", path.display()))
        })
        .await
        .context("training data writer panicked")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DataLayout;
    use async_trait::async_trait;

    #[test]
    fn chunks_cover_range_without_overlap() {
        let chunks = history_chunks(0, 2_500 * 300, Interval::FiveMinute, 1_000);
        assert_eq!(
            chunks,
            vec![
                (0, 300_000),
                (300_000, 600_000),
                (600_000, 750_000)
            ]
        );
        assert!(history_chunks(10, 10, Interval::OneDay, 5).is_empty());
    }

    struct Flat;

    #[async_trait]
    impl MarketDataProvider for Flat {
        async fn fetch(
            &self,
            _symbol: &str,
            _quote: &str,
            interval: Interval,
            start: i64,
            end: i64,
            _limit: i64,
        ) -> Result<Vec<OhlcRecord>> {
            let first = start - start.rem_euclid(interval.secs());
            Ok((first..end)
                .step_by(interval.secs() as usize)
                .filter(|&t| t >= start)
                .map(|t| OhlcRecord::splat(t, 5.0))
                .collect())
        }
    }

    fn scheduler(dir: &std::path::Path) -> (TrainingScheduler, Arc<ModelRegistry>, Channel<TrainingBatch>) {
        let config = Arc::new(PipelineConfig {
            layout: DataLayout::new(dir),
            intervals: vec![Interval::OneDay],
            training_history_days: 30,
            ..PipelineConfig::default()
        });
        let registry = Arc::new(ModelRegistry::new(
            config.layout.model_dir(),
            Duration::from_millis(50),
        ));
        let output = Channel::new("training", config.channel_backoff());
        (
            TrainingScheduler::new(config, Arc::new(Flat), registry.clone(), output.clone()),
            registry,
            output,
        )
    }

    #[tokio::test]
    async fn queues_history_once_per_cooldown() {
        let dir = tempfile::tempdir().unwrap();
        let (mut scheduler, _, output) = scheduler(dir.path());
        let cancel = CancellationToken::new();

        assert!(scheduler.check_interval(Interval::OneDay, &cancel).await.unwrap());
        assert!(!scheduler.check_interval(Interval::OneDay, &cancel).await.unwrap());
        assert_eq!(output.depth(), 1);

        let csv = fs::read_to_string(dir.path().join("TrainingData/training_oneDay.csv")).unwrap();
        assert!(csv.starts_with("close,date,high"));
        assert!(csv.lines().count() >= 29);
    }

    #[tokio::test]
    async fn fresh_model_suppresses_request() {
        let dir = tempfile::tempdir().unwrap();
        let (mut scheduler, registry, output) = scheduler(dir.path());
        registry
            .publish(Interval::OneDay, crate::utils::now_utc(), |d| {
                fs::write(d.join("model.json"), "{}")?;
                Ok(())
            })
            .unwrap();

        assert!(!scheduler
            .check_interval(Interval::OneDay, &CancellationToken::new())
            .await
            .unwrap());
        assert_eq!(output.depth(), 0);
    }
}
