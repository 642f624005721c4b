//! Turns training batches into published model artifacts.
//!
//! The min-max snapshot is taken from the exact batch being trained on and
//! stored next to the model, then mirrored to `MinMaxData/` where the
//! preprocessor picks it up.

use {
    super::messages::TrainingBatch,
    crate::{
        config::{HyperParameters, PipelineConfig},
        data::save_json_atomic,
        domain::{Interval, ModelArtifact},
        models::{HYPER_PARAMETERS_FILE, METRICS_FILE, MINMAX_FILE, ModelBackend, ModelRegistry},
        pipeline::{Channel, MinMaxSnapshot, MinMaxTracker, Scaler, TrainingSet},
        trace_time,
        utils::now_utc,
    },
    anyhow::{Context, Result},
    chrono::{DateTime, Duration as ChronoDuration, SubsecRound, Utc},
    std::sync::Arc,
    tokio_util::sync::CancellationToken,
};

pub struct TrainAgent {
    config: Arc<PipelineConfig>,
    backend: Arc<dyn ModelBackend>,
    registry: Arc<ModelRegistry>,
    input: Channel<TrainingBatch>,
}

impl TrainAgent {
    pub fn new(
        config: Arc<PipelineConfig>,
        backend: Arc<dyn ModelBackend>,
        registry: Arc<ModelRegistry>,
        input: Channel<TrainingBatch>,
    ) -> Self {
        Self {
            config,
            backend,
            registry,
            input,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        log::info!("🏋️ Trainer started with '{}' backend", self.backend.name());

        while let Some(batch) = self.input.take(&cancel).await {
            let interval = batch.interval;
            match self.train(batch).await {
                Ok(artifact) => log::info!("🏋️ Published {}", artifact),
                Err(e) => log::error!("Training {} failed: {:#}", interval, e),
            }
        }

        log::info!("🏋️ Trainer stopped");
    }

    pub async fn train(&self, batch: TrainingBatch) -> Result<ModelArtifact> {
        let TrainingBatch { interval, records } = batch;
        let records: Vec<_> = records.into_iter().filter(|r| r.is_valid()).collect();

        let mut tracker = MinMaxTracker::new();
        tracker.assess_all(&records);
        let snapshot = tracker
            .snapshot()
            .with_context(|| format!("{} training batch has no valid records", interval))?;
        let scaler = Scaler::build(&snapshot, self.config.headroom_pct)?;

        let scaled: Vec<_> = records.iter().map(|r| scaler.scale(r)).collect();
        let hyper = self.config.hyper_params.clone();
        let set = TrainingSet::convolve(&scaled, hyper.look_back, hyper.look_forward);
        log::info!(
            "🏋️ Training {} on {} example(s) from {} candle(s)",
            interval,
            set.len(),
            records.len()
        );

        let created_at = self.next_created_at(interval)?;
        let backend = Arc::clone(&self.backend);
        let registry = Arc::clone(&self.registry);

        let artifact = tokio::task::spawn_blocking(move || {
            trace_time!(format!("train {}", interval), 1_000, {
                registry.publish(interval, created_at, |dir| {
                    write_artifact(backend.as_ref(), &set, &hyper, &snapshot, dir)
                })
            })
        })
        .await
        .context("training task panicked")??;

        let minmax_path = self.config.layout.minmax_path(interval);
        tokio::task::spawn_blocking(move || snapshot.save(&minmax_path))
            .await
            .context("snapshot writer panicked")??;

        Ok(artifact)
    }

    /// Creation time for a new artifact: now, or one second after the newest
    /// existing one if the clock has not moved past it.
    fn next_created_at(&self, interval: Interval) -> Result<DateTime<Utc>> {
        let now = now_utc().trunc_subsecs(0);
        let latest = self.registry.latest(interval)?;
        Ok(match latest {
            Some(latest) if latest.created_at >= now => latest.created_at + ChronoDuration::seconds(1),
            _ => now,
        })
    }
}

fn write_artifact(
    backend: &dyn ModelBackend,
    set: &TrainingSet,
    hyper: &HyperParameters,
    snapshot: &MinMaxSnapshot,
    dir: &std::path::Path,
) -> Result<()> {
    let metrics = backend.train(set, hyper, dir)?;
    save_json_atomic(&dir.join(METRICS_FILE), &metrics)?;
    save_json_atomic(&dir.join(HYPER_PARAMETERS_FILE), hyper)?;
    save_json_atomic(&dir.join(MINMAX_FILE), snapshot)?;
    Ok(())
}
