use {
    crate::{config::HyperParameters, domain::ScaledRecord, pipeline::TrainingSet},
    anyhow::Result,
    serde::{Deserialize, Serialize},
    std::{collections::BTreeMap, path::Path, sync::Arc},
};

pub const MODEL_FILE: &str = "model.json";
pub const WEIGHTS_FILE: &str = "weights.json";
pub const METRICS_FILE: &str = "metrics.json";
pub const HYPER_PARAMETERS_FILE: &str = "HyperParameters.json";
pub const MINMAX_FILE: &str = "minmax.json";

/// A fully loaded model. Shared behind an `Arc` so a hot-swap never touches
/// a model another prediction is still using.
pub trait ForecastModel: Send + Sync {
    /// Scaled close expected `lookforward` steps after the last record of `window`.
    fn predict(&self, window: &[ScaledRecord]) -> Result<f64>;

    fn lookback(&self) -> usize;
}

/// Training history as stored in `metrics.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrainingMetrics {
    pub last_metric_map: BTreeMap<String, f64>,
    pub metrics_map: BTreeMap<String, Vec<f64>>,
}

impl TrainingMetrics {
    pub fn record(&mut self, name: &str, history: Vec<f64>) {
        if let Some(last) = history.last() {
            self.last_metric_map.insert(name.to_string(), *last);
        }
        self.metrics_map.insert(name.to_string(), history);
    }
}

/// Pluggable training / inference engine. Both calls do blocking work and are
/// run on the blocking pool by the agents.
pub trait ModelBackend: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fits a model to `set` and writes its definition and weights into `dir`.
    fn train(
        &self,
        set: &TrainingSet,
        hyper: &HyperParameters,
        dir: &Path,
    ) -> Result<TrainingMetrics>;

    /// Reads a model previously written by [`ModelBackend::train`].
    fn load(&self, dir: &Path) -> Result<Arc<dyn ForecastModel>>;
}
