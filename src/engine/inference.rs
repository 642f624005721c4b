//! Serves predictions from the newest model of each interval.
//!
//! Hot-swap protocol:
//! - at startup, wait until every configured interval has an artifact and
//!   load each one fully;
//! - keep exactly one background "next artifact" wait per interval;
//! - before each prediction, collect finished waits without blocking, load
//!   the new model, replace the interval's `Arc` and re-arm the wait.
//!
//! A prediction clones the `Arc` it uses, so a swap can never change the
//! model under a prediction in flight.

use {
    super::messages::ScaledWindow,
    crate::{
        config::{DF, PipelineConfig},
        data::PersistenceLog,
        domain::{Interval, ModelArtifact, Prediction},
        models::{ForecastModel, MINMAX_FILE, ModelBackend, ModelRegistry},
        pipeline::{Channel, ChannelError, MinMaxSnapshot, Scaler},
    },
    anyhow::{Context, Result, bail},
    chrono::{DateTime, Utc},
    futures::StreamExt,
    std::{
        collections::{HashMap, HashSet},
        sync::Arc,
    },
    thiserror::Error,
    tokio::task::JoinHandle,
    tokio_util::sync::CancellationToken,
};

/// A model together with the scaling it was trained under.
pub struct ActiveModel {
    pub artifact: ModelArtifact,
    pub model: Arc<dyn ForecastModel>,
    pub scaler: Scaler,
}

#[derive(Debug, Error, PartialEq)]
pub enum WindowMismatch {
    #[error("{0} window was scaled with a different snapshot than the active model")]
    Scaling(Interval),
    #[error("{interval} window has {got} records, model expects {expected}")]
    Length {
        interval: Interval,
        got: usize,
        expected: usize,
    },
}

impl ActiveModel {
    /// Fails with [`WindowMismatch`] when the window does not fit this model:
    /// wrong length, or scaled under another snapshot.
    pub fn predict(&self, window: &ScaledWindow) -> Result<Prediction> {
        let (Some(last), Some(unix_time)) = (window.last(), window.target_time()) else {
            bail!("empty window");
        };
        let expected = self.model.lookback();
        if window.records.len() != expected {
            return Err(WindowMismatch::Length {
                interval: window.interval,
                got: window.records.len(),
                expected,
            }
            .into());
        }
        if *window.scaler != self.scaler {
            return Err(WindowMismatch::Scaling(window.interval).into());
        }

        let scaled_close = self.model.predict(&window.records)?;
        let scaler = &window.scaler;
        Ok(Prediction {
            close: scaler.descale_close(scaled_close),
            unix_time,
            interval: window.interval,
            reference_close: scaler.descale_close(last.close),
        })
    }
}

/// Loads model and scaling of `artifact` on the blocking pool. Nothing is
/// returned until both are complete.
pub async fn load_active(
    backend: Arc<dyn ModelBackend>,
    artifact: ModelArtifact,
    fallback_snapshot: std::path::PathBuf,
    headroom_pct: f64,
) -> Result<ActiveModel> {
    tokio::task::spawn_blocking(move || -> Result<ActiveModel> {
        let model = backend
            .load(&artifact.location)
            .with_context(|| format!("loading {}", artifact))?;

        let snapshot = match MinMaxSnapshot::load(&artifact.location.join(MINMAX_FILE))? {
            Some(snapshot) => snapshot,
            None => MinMaxSnapshot::load(&fallback_snapshot)?.with_context(|| {
                format!("no min-max snapshot for {} or at {}", artifact, fallback_snapshot.display())
            })?,
        };
        let scaler = Scaler::build(&snapshot, headroom_pct)?;

        Ok(ActiveModel {
            artifact,
            model,
            scaler,
        })
    })
    .await
    .context("model loader panicked")?
}

pub struct InferenceAgent {
    config: Arc<PipelineConfig>,
    registry: Arc<ModelRegistry>,
    backend: Arc<dyn ModelBackend>,
    input: Channel<ScaledWindow>,
    output: Channel<Prediction>,
    log: PersistenceLog,
    active: HashMap<Interval, Arc<ActiveModel>>,
    awaiting: HashMap<Interval, JoinHandle<Option<ModelArtifact>>>,
}

impl InferenceAgent {
    pub fn new(
        config: Arc<PipelineConfig>,
        registry: Arc<ModelRegistry>,
        backend: Arc<dyn ModelBackend>,
        input: Channel<ScaledWindow>,
        output: Channel<Prediction>,
    ) -> Self {
        Self {
            log: PersistenceLog::new(config.file_expiration_secs),
            config,
            registry,
            backend,
            input,
            output,
            active: HashMap::new(),
            awaiting: HashMap::new(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        let waits = cancel.child_token();

        if self.start(&cancel, &waits).await {
            log::info!("🔮 Inference serving {} interval(s)", self.active.len());
            while let Some(window) = self.input.take(&cancel).await {
                self.swap_finished(&waits).await;
                match self.serve(&window).await {
                    Ok(_) => {}
                    Err(e) if e.downcast_ref::<ChannelError>().is_some() => {
                        log::warn!("Prediction output closed: {:#}", e);
                        break;
                    }
                    Err(e) => log::error!("Prediction for {} failed: {:#}", window.interval, e),
                }
            }
        }

        waits.cancel();
        for (_, handle) in self.awaiting.drain() {
            handle.abort();
        }
        self.output.complete();
        log::info!("🔮 Inference stopped");
    }

    /// Blocks until every configured interval has an artifact, then loads them.
    /// `false` if cancelled first.
    pub async fn start(&mut self, cancel: &CancellationToken, waits: &CancellationToken) -> bool {
        let mut first: HashMap<Interval, ModelArtifact> = HashMap::new();
        for &interval in &self.config.intervals {
            match self.registry.latest(interval) {
                Ok(Some(artifact)) => {
                    first.insert(interval, artifact);
                }
                Ok(None) => {}
                Err(e) => log::error!("Scanning {} models failed: {:#}", interval, e),
            }
        }

        let required: HashSet<Interval> = self.config.intervals.iter().copied().collect();
        if first.len() < required.len() {
            let missing: Vec<_> = required.iter().filter(|i| !first.contains_key(*i)).collect();
            log::info!("🔮 Waiting for first models of {:?}", missing);

            let stream = self.registry.stream_new_artifacts(cancel.clone());
            tokio::pin!(stream);
            // Anything published between the scan above and the stream's own baseline
            for &interval in &required {
                if !first.contains_key(&interval)
                    && let Ok(Some(artifact)) = self.registry.latest(interval)
                {
                    first.insert(interval, artifact);
                }
            }
            while first.len() < required.len() {
                let Some(artifact) = stream.next().await else {
                    return false;
                };
                if required.contains(&artifact.interval) {
                    let newer = first
                        .get(&artifact.interval)
                        .is_none_or(|current| artifact.created_at > current.created_at);
                    if newer {
                        first.insert(artifact.interval, artifact);
                    }
                }
            }
        }

        for (interval, artifact) in first {
            let after = artifact.created_at;
            self.install(interval, artifact).await;
            self.arm(interval, Some(after), waits);
        }
        true
    }

    /// Starts the background wait for the next artifact newer than `after`.
    fn arm(&mut self, interval: Interval, after: Option<DateTime<Utc>>, waits: &CancellationToken) {
        let registry = Arc::clone(&self.registry);
        let cancel = waits.clone();
        let handle =
            tokio::spawn(async move { registry.next_after(interval, after, &cancel).await });
        self.awaiting.insert(interval, handle);
    }

    /// Loads `artifact` and publishes it for `interval`. On failure the
    /// previous model, if any, stays active.
    async fn install(&mut self, interval: Interval, artifact: ModelArtifact) {
        let fallback = self.config.layout.minmax_path(interval);
        match load_active(
            Arc::clone(&self.backend),
            artifact.clone(),
            fallback,
            self.config.headroom_pct,
        )
        .await
        {
            Ok(loaded) => {
                if DF.log_model_swaps {
                    log::info!("🔄 Active model for {} is now {}", interval, loaded.artifact);
                }
                self.active.insert(interval, Arc::new(loaded));
            }
            Err(e) => {
                let kept = self.active.contains_key(&interval);
                log::error!(
                    "Could not load {}: {:#}. {}",
                    artifact,
                    e,
                    if kept {
                        "Keeping the previous model"
                    } else {
                        "Skipping predictions until a readable model appears"
                    }
                );
            }
        }
    }

    /// Non-blocking check of every pending wait; swaps in whatever finished.
    pub async fn swap_finished(&mut self, waits: &CancellationToken) {
        let finished: Vec<Interval> = self
            .awaiting
            .iter()
            .filter(|(_, handle)| handle.is_finished())
            .map(|(interval, _)| *interval)
            .collect();

        for interval in finished {
            let Some(handle) = self.awaiting.remove(&interval) else {
                continue;
            };
            match handle.await {
                Ok(Some(artifact)) => {
                    let after = artifact.created_at;
                    self.install(interval, artifact).await;
                    // Re-arm after the artifact just seen, loaded or not
                    self.arm(interval, Some(after), waits);
                }
                Ok(None) => {}
                Err(e) => {
                    log::error!("Model wait for {} failed: {}", interval, e);
                    let after = self.active.get(&interval).map(|a| a.artifact.created_at);
                    self.arm(interval, after, waits);
                }
            }
        }
    }

    pub fn active_model(&self, interval: Interval) -> Option<Arc<ActiveModel>> {
        self.active.get(&interval).cloned()
    }

    async fn serve(&self, window: &ScaledWindow) -> Result<()> {
        let Some(active) = self.active_model(window.interval) else {
            log::debug!("No usable model for {}, window skipped", window.interval);
            return Ok(());
        };

        let prediction = match active.predict(window) {
            Ok(prediction) => prediction,
            Err(e) if e.downcast_ref::<WindowMismatch>().is_some() => {
                log::warn!("Window skipped: {:#}", e);
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        if DF.log_predictions {
            log::info!(
                "🔮 {} close {:.4} at {} (from {:.4})",
                prediction.interval,
                prediction.close,
                prediction.unix_time,
                prediction.reference_close
            );
        }

        self.log
            .append_async(self.config.layout.predictions_dir(), vec![prediction])
            .await?;
        self.output.put(prediction)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::DataLayout,
        domain::OhlcRecord,
        models::DriftBackend,
        pipeline::TryTake,
    };
    use chrono::SubsecRound;
    use std::time::Duration;

    fn snapshot(max: f64) -> MinMaxSnapshot {
        MinMaxSnapshot {
            minimum: OhlcRecord::splat(1, 0.0),
            maximum: OhlcRecord::splat(2, max),
        }
    }

    fn write_drift(dir: &std::path::Path, lookback: usize, drift: f64, max: f64) -> anyhow::Result<()> {
        std::fs::write(
            dir.join("model.json"),
            format!(r#"{{"kind":"drift","lookback":{},"lookforward":1}}"#, lookback),
        )?;
        std::fs::write(dir.join("weights.json"), format!(r#"{{"drift":{}}}"#, drift))?;
        snapshot(max).save(&dir.join(MINMAX_FILE))
    }

    /// Scales raw `closes` (opened at 600, 900, ...) the way preprocessing would.
    fn window(max: f64, closes: &[f64]) -> ScaledWindow {
        let scaler = Arc::new(Scaler::build(&snapshot(max), 0.0).unwrap());
        let records = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| scaler.scale(&OhlcRecord::splat(600 + 300 * i as i64, c)))
            .collect();
        ScaledWindow {
            interval: Interval::OneDay,
            records,
            scaler,
        }
    }

    fn agent(dir: &std::path::Path) -> (InferenceAgent, Arc<ModelRegistry>, Channel<Prediction>) {
        let mut config = PipelineConfig {
            layout: DataLayout::new(dir),
            intervals: vec![Interval::OneDay],
            headroom_pct: 0.0,
            ..PipelineConfig::default()
        };
        config.hyper_params.look_back = 2;
        let config = Arc::new(config);
        let registry = Arc::new(ModelRegistry::new(
            config.layout.model_dir(),
            Duration::from_millis(20),
        ));
        let output = Channel::new("predictions", config.channel_backoff());
        let agent = InferenceAgent::new(
            config.clone(),
            registry.clone(),
            Arc::new(DriftBackend),
            Channel::new("windows", config.channel_backoff()),
            output.clone(),
        );
        (agent, registry, output)
    }

    fn ten_seconds_ago() -> DateTime<Utc> {
        Utc::now().trunc_subsecs(0) - chrono::Duration::seconds(10)
    }

    #[tokio::test]
    async fn predicts_with_descaled_close_and_target_time() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path(), Duration::from_millis(50));
        let artifact = registry
            .publish(Interval::OneDay, Utc::now(), |d| write_drift(d, 2, 0.1, 100.0))
            .unwrap();

        let active = load_active(
            Arc::new(DriftBackend),
            artifact,
            dir.path().join("missing.json"),
            0.0,
        )
        .await
        .unwrap();

        let prediction = active.predict(&window(100.0, &[40.0, 50.0])).unwrap();
        assert!((prediction.close - 60.0).abs() < 1e-9);
        assert!((prediction.reference_close - 50.0).abs() < 1e-9);
        assert_eq!(prediction.unix_time, 900 + 86_400);
    }

    #[tokio::test]
    async fn window_of_wrong_length_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ModelRegistry::new(dir.path(), Duration::from_millis(50));
        let artifact = registry
            .publish(Interval::OneDay, Utc::now(), |d| write_drift(d, 2, 0.0, 100.0))
            .unwrap();
        let active = load_active(Arc::new(DriftBackend), artifact, dir.path().join("none"), 0.0)
            .await
            .unwrap();

        let err = active.predict(&window(100.0, &[1.0, 2.0, 3.0])).unwrap_err();
        assert_eq!(
            err.downcast_ref::<WindowMismatch>(),
            Some(&WindowMismatch::Length {
                interval: Interval::OneDay,
                got: 3,
                expected: 2
            })
        );
    }

    #[tokio::test]
    async fn queued_window_from_old_snapshot_is_not_descaled_by_new_model() {
        let dir = tempfile::tempdir().unwrap();
        let (mut agent, registry, output) = agent(dir.path());
        registry
            .publish(Interval::OneDay, ten_seconds_ago(), |d| write_drift(d, 2, 0.0, 100.0))
            .unwrap();
        let cancel = CancellationToken::new();
        assert!(agent.start(&cancel, &cancel).await);

        // Scaled under 0..100, still queued when a retrain lands with 0..200
        let stale = window(100.0, &[40.0, 50.0]);
        registry
            .publish(Interval::OneDay, Utc::now().trunc_subsecs(0), |d| {
                write_drift(d, 2, 0.0, 200.0)
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        agent.swap_finished(&cancel).await;

        let active = agent.active_model(Interval::OneDay).unwrap();
        let err = active.predict(&stale).unwrap_err();
        assert_eq!(
            err.downcast_ref::<WindowMismatch>(),
            Some(&WindowMismatch::Scaling(Interval::OneDay))
        );
        agent.serve(&stale).await.unwrap();
        assert_eq!(output.depth(), 0);

        // Windows scaled under the new snapshot round-trip to raw prices
        let fresh = window(200.0, &[40.0, 50.0]);
        agent.serve(&fresh).await.unwrap();
        let TryTake::Item(prediction) = output.try_take() else {
            panic!("expected a prediction");
        };
        assert!((prediction.reference_close - 50.0).abs() < 1e-9);
        assert!((prediction.close - 50.0).abs() < 1e-9);
        cancel.cancel();
    }

    #[tokio::test]
    async fn unreadable_artifact_keeps_previous_model() {
        let dir = tempfile::tempdir().unwrap();
        let (mut agent, registry, _) = agent(dir.path());
        let good = registry
            .publish(Interval::OneDay, ten_seconds_ago(), |d| write_drift(d, 2, 0.0, 100.0))
            .unwrap();

        let cancel = CancellationToken::new();
        assert!(agent.start(&cancel, &cancel).await);
        assert_eq!(agent.active_model(Interval::OneDay).unwrap().artifact, good);

        registry
            .publish(Interval::OneDay, Utc::now(), |d| {
                std::fs::write(d.join("model.json"), "garbage")?;
                Ok(())
            })
            .unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        agent.swap_finished(&cancel).await;

        assert_eq!(agent.active_model(Interval::OneDay).unwrap().artifact, good);
        assert_eq!(agent.awaiting.len(), 1);
        cancel.cancel();
    }
}
