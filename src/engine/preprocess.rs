//! Scales raw records with the interval's current min-max snapshot and slides
//! them into fixed-length windows for inference.

use {
    super::messages::{IntervalRecord, ScaledWindow},
    crate::{
        config::PipelineConfig,
        data::PersistenceLog,
        domain::{Interval, ScaledRecord},
        pipeline::{Channel, ChannelError, MinMaxSnapshot, Scaler, WindowAccumulator},
    },
    anyhow::{Context, Result, bail},
    std::{
        collections::{HashMap, HashSet},
        fs,
        sync::Arc,
        time::SystemTime,
    },
    tokio_util::sync::CancellationToken,
};

struct CachedScaler {
    modified: Option<SystemTime>,
    scaler: Arc<Scaler>,
}

pub struct PreprocessAgent {
    config: Arc<PipelineConfig>,
    log: PersistenceLog,
    input: Channel<IntervalRecord>,
    output: Channel<ScaledWindow>,
    windows: WindowAccumulator<ScaledRecord>,
    scalers: HashMap<Interval, CachedScaler>,
    // Intervals whose missing snapshot was already reported
    reported_missing: HashSet<Interval>,
}

impl PreprocessAgent {
    pub fn new(
        config: Arc<PipelineConfig>,
        input: Channel<IntervalRecord>,
        output: Channel<ScaledWindow>,
    ) -> Self {
        Self {
            log: PersistenceLog::new(config.file_expiration_secs),
            windows: WindowAccumulator::new(config.lookback()),
            config,
            input,
            output,
            scalers: HashMap::new(),
            reported_missing: HashSet::new(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        log::info!("🧮 Preprocess started (lookback {})", self.windows.capacity());

        while let Some(item) = self.input.take(&cancel).await {
            match self.process(item).await {
                Ok(_) => {}
                Err(e) if e.downcast_ref::<ChannelError>().is_some() => {
                    log::warn!("Preprocess output closed: {:#}", e);
                    break;
                }
                Err(e) => log::error!("Preprocess of {} record failed: {:#}", item.interval, e),
            }
        }

        self.output.complete();
        log::info!("🧮 Preprocess stopped");
    }

    /// Scales one record, persists it, and forwards a window when one completes.
    /// `Ok(false)` when the record was skipped for lack of a snapshot.
    pub async fn process(&mut self, item: IntervalRecord) -> Result<bool> {
        let IntervalRecord { interval, record } = item;
        if !self.config.intervals.contains(&interval) {
            bail!("interval {} is not configured", interval);
        }
        if !record.is_valid() {
            return Ok(false);
        }

        let Some(scaler) = self.current_scaler(interval)? else {
            return Ok(false);
        };
        let scaled = scaler.scale(&record);

        self.log
            .append_async(self.config.layout.normalized_dir(), vec![scaled])
            .await?;

        if let Some(records) = self.windows.push(interval, scaled) {
            self.output.put(ScaledWindow {
                interval,
                records,
                scaler,
            })?;
        }
        Ok(true)
    }

    /// The scaler for `interval`, rebuilt whenever the snapshot file changes.
    /// Rebuilding discards the partial window so no window mixes two scalings.
    fn current_scaler(&mut self, interval: Interval) -> Result<Option<Arc<Scaler>>> {
        let path = self.config.layout.minmax_path(interval);
        let modified = match fs::metadata(&path) {
            Ok(meta) => meta.modified().ok(),
            Err(_) => {
                if self.reported_missing.insert(interval) {
                    log::error!(
                        "No min-max snapshot for {} at {}; skipping its records until one is trained",
                        interval,
                        path.display()
                    );
                }
                return Ok(None);
            }
        };

        if let Some(cached) = self.scalers.get(&interval)
            && cached.modified.is_some()
            && cached.modified == modified
        {
            return Ok(Some(Arc::clone(&cached.scaler)));
        }

        let snapshot = MinMaxSnapshot::load(&path)?
            .with_context(|| format!("{} vanished while loading", path.display()))?;
        let scaler = Arc::new(Scaler::build(&snapshot, self.config.headroom_pct)?);

        if self.scalers.contains_key(&interval) {
            log::info!("🔁 New min-max snapshot for {}, restarting its window", interval);
        }
        self.windows.reset(interval);
        self.reported_missing.remove(&interval);
        self.scalers.insert(
            interval,
            CachedScaler {
                modified,
                scaler: Arc::clone(&scaler),
            },
        );
        Ok(Some(scaler))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{config::DataLayout, domain::OhlcRecord, pipeline::TryTake};

    fn setup(dir: &std::path::Path, lookback: usize) -> (PreprocessAgent, Channel<ScaledWindow>) {
        let mut config = PipelineConfig {
            layout: DataLayout::new(dir),
            intervals: vec![Interval::FiveMinute],
            headroom_pct: 0.0,
            ..PipelineConfig::default()
        };
        config.hyper_params.look_back = lookback;
        let config = Arc::new(config);
        let input = Channel::new("raw", config.channel_backoff());
        let output = Channel::new("windows", config.channel_backoff());
        (PreprocessAgent::new(config, input, output.clone()), output)
    }

    fn record(i: i64) -> IntervalRecord {
        IntervalRecord {
            interval: Interval::FiveMinute,
            record: OhlcRecord::splat(1_000 + i * 300, i as f64),
        }
    }

    fn write_snapshot(dir: &std::path::Path, hi: f64) {
        MinMaxSnapshot {
            minimum: OhlcRecord::splat(1, 0.0),
            maximum: OhlcRecord::splat(2, hi),
        }
        .save(&DataLayout::new(dir).minmax_path(Interval::FiveMinute))
        .unwrap();
    }

    #[tokio::test]
    async fn records_without_snapshot_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (mut agent, output) = setup(dir.path(), 2);
        assert!(!agent.process(record(1)).await.unwrap());
        assert!(!agent.process(record(2)).await.unwrap());
        assert_eq!(output.depth(), 0);
    }

    #[tokio::test]
    async fn emits_scaled_windows_once_full() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), 10.0);
        let (mut agent, output) = setup(dir.path(), 2);

        for i in 1..=3 {
            assert!(agent.process(record(i)).await.unwrap());
        }

        let TryTake::Item(first) = output.try_take() else {
            panic!("expected a window");
        };
        assert_eq!(first.records.len(), 2);
        assert!((first.records[0].close - 0.1).abs() < 1e-12);
        assert_eq!(first.records[0].date, 1_300);
        assert_eq!(output.depth(), 1);
        assert_eq!(
            std::fs::read_dir(dir.path().join("NormalizedData")).unwrap().count(),
            1
        );
    }

    #[tokio::test]
    async fn unknown_interval_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let (mut agent, _) = setup(dir.path(), 2);
        let item = IntervalRecord {
            interval: Interval::OneDay,
            record: OhlcRecord::splat(5, 1.0),
        };
        assert!(agent.process(item).await.is_err());
    }

    #[tokio::test]
    async fn new_snapshot_restarts_partial_window() {
        let dir = tempfile::tempdir().unwrap();
        write_snapshot(dir.path(), 10.0);
        let (mut agent, output) = setup(dir.path(), 2);
        agent.process(record(1)).await.unwrap();

        // Force a different modification time
        std::thread::sleep(std::time::Duration::from_millis(20));
        write_snapshot(dir.path(), 20.0);
        let path = DataLayout::new(dir.path()).minmax_path(Interval::FiveMinute);
        let bumped = SystemTime::now() + std::time::Duration::from_secs(5);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(bumped)
            .unwrap();

        agent.process(record(2)).await.unwrap();
        assert_eq!(output.depth(), 0);
        agent.process(record(3)).await.unwrap();
        let TryTake::Item(window) = output.try_take() else {
            panic!("expected a window");
        };
        assert!((window.records[0].close - 0.1).abs() < 1e-12);
        // The window carries the scaling it was built with
        assert!((window.scaler.descale_close(window.records[0].close) - 2.0).abs() < 1e-12);
    }
}
