//! Preprocess and inference wired through real channels, a real registry and
//! temp directories, with a stub model backend.

use {
    anyhow::{Context, Result},
    candle_cast::{
        DataLayout, ModelRegistry, PipelineConfig,
        config::HyperParameters,
        domain::{Interval, OhlcRecord, Prediction, ScaledRecord},
        engine::{InferenceAgent, IntervalRecord, PreprocessAgent, ScaledWindow},
        models::{ForecastModel, MINMAX_FILE, MODEL_FILE, ModelBackend, TrainingMetrics},
        pipeline::{Channel, MinMaxSnapshot, TrainingSet},
    },
    chrono::{Duration as ChronoDuration, SubsecRound, Utc},
    serde::{Deserialize, Serialize},
    std::{path::Path, sync::Arc, time::Duration},
    tokio_util::sync::CancellationToken,
};

const LOOKBACK: usize = 2;

/// Predicts the last scaled close plus a fixed offset.
#[derive(Serialize, Deserialize)]
struct OffsetModel {
    offset: f64,
}

impl ForecastModel for OffsetModel {
    fn predict(&self, window: &[ScaledRecord]) -> Result<f64> {
        let last = window.last().context("empty window")?;
        Ok(last.close + self.offset)
    }

    fn lookback(&self) -> usize {
        LOOKBACK
    }
}

struct OffsetBackend;

impl ModelBackend for OffsetBackend {
    fn name(&self) -> &'static str {
        "offset"
    }

    fn train(&self, _: &TrainingSet, _: &HyperParameters, _: &Path) -> Result<TrainingMetrics> {
        anyhow::bail!("not used")
    }

    fn load(&self, dir: &Path) -> Result<Arc<dyn ForecastModel>> {
        let text = std::fs::read_to_string(dir.join(MODEL_FILE))?;
        let model: OffsetModel = serde_json::from_str(&text)?;
        Ok(Arc::new(model))
    }
}

fn snapshot() -> MinMaxSnapshot {
    MinMaxSnapshot {
        minimum: OhlcRecord::splat(0, 0.0),
        maximum: OhlcRecord::splat(1, 100.0),
    }
}

fn publish(registry: &ModelRegistry, offset: f64, age_secs: i64) {
    let created = Utc::now().trunc_subsecs(0) - ChronoDuration::seconds(age_secs);
    registry
        .publish(Interval::FiveMinute, created, |dir| {
            std::fs::write(dir.join(MODEL_FILE), format!(r#"{{"offset":{}}}"#, offset))?;
            snapshot().save(&dir.join(MINMAX_FILE))
        })
        .unwrap();
}

struct Harness {
    raw: Channel<IntervalRecord>,
    predictions: Channel<Prediction>,
    registry: Arc<ModelRegistry>,
    cancel: CancellationToken,
    tasks: Vec<tokio::task::JoinHandle<()>>,
    _dir: tempfile::TempDir,
}

fn start() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig {
        layout: DataLayout::new(dir.path()),
        intervals: vec![Interval::FiveMinute],
        headroom_pct: 0.0,
        channel_poll_ms: 10,
        registry_scan_secs: 1,
        ..PipelineConfig::default()
    };
    config.hyper_params.look_back = LOOKBACK;
    let config = Arc::new(config);

    snapshot()
        .save(&config.layout.minmax_path(Interval::FiveMinute))
        .unwrap();
    let registry = Arc::new(ModelRegistry::new(
        config.layout.model_dir(),
        Duration::from_millis(50),
    ));
    publish(&registry, 0.01, 60);

    let raw = Channel::new("raw", config.channel_backoff());
    let windows = Channel::<ScaledWindow>::new("windows", config.channel_backoff());
    let predictions = Channel::new("predictions", config.channel_backoff());
    let cancel = CancellationToken::new();

    let tasks = vec![
        tokio::spawn(
            PreprocessAgent::new(config.clone(), raw.clone(), windows.clone()).run(cancel.clone()),
        ),
        tokio::spawn(
            InferenceAgent::new(
                config.clone(),
                registry.clone(),
                Arc::new(OffsetBackend),
                windows,
                predictions.clone(),
            )
            .run(cancel.clone()),
        ),
    ];

    Harness {
        raw,
        predictions,
        registry,
        cancel,
        tasks,
        _dir: dir,
    }
}

fn candle(i: i64, close: f64) -> IntervalRecord {
    IntervalRecord {
        interval: Interval::FiveMinute,
        record: OhlcRecord::splat(i * 300, close),
    }
}

async fn next_prediction(h: &Harness) -> Prediction {
    tokio::time::timeout(Duration::from_secs(5), h.predictions.take(&h.cancel))
        .await
        .expect("prediction timed out")
        .expect("prediction channel closed")
}

#[tokio::test]
async fn records_flow_to_descaled_predictions() {
    let h = start();
    for (i, close) in [(1, 10.0), (2, 20.0), (3, 30.0)] {
        h.raw.put(candle(i, close)).unwrap();
    }
    h.raw.complete();

    let first = next_prediction(&h).await;
    assert_eq!(first.unix_time, 3 * 300);
    assert!((first.close - 21.0).abs() < 1e-9);
    assert!((first.reference_close - 20.0).abs() < 1e-9);

    let second = next_prediction(&h).await;
    assert_eq!(second.unix_time, 4 * 300);
    assert!((second.close - 31.0).abs() < 1e-9);

    // Completion cascades through both agents
    for task in h.tasks {
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
    assert!(h.predictions.is_completed());
    assert_eq!(h.predictions.depth(), 0);
}

#[tokio::test]
async fn newer_model_is_swapped_in_between_predictions() {
    let h = start();
    h.raw.put(candle(1, 10.0)).unwrap();
    h.raw.put(candle(2, 20.0)).unwrap();
    let before = next_prediction(&h).await;
    assert!((before.close - 21.0).abs() < 1e-9);

    publish(&h.registry, 0.05, 0);
    // Let the background wait observe the new folder
    tokio::time::sleep(Duration::from_millis(300)).await;

    h.raw.put(candle(3, 30.0)).unwrap();
    let after = next_prediction(&h).await;
    assert!((after.close - 35.0).abs() < 1e-9);

    h.cancel.cancel();
    for task in h.tasks {
        tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
    }
}
