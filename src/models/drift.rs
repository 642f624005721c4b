//! Baseline backend: extrapolates the average per-step close change seen in training.

use {
    crate::{
        config::HyperParameters,
        data::{load_json, save_json_atomic},
        domain::ScaledRecord,
        models::backend::{
            ForecastModel, MODEL_FILE, ModelBackend, TrainingMetrics, WEIGHTS_FILE,
        },
        pipeline::TrainingSet,
    },
    anyhow::{Context, Result, bail, ensure},
    serde::{Deserialize, Serialize},
    std::{path::Path, sync::Arc},
};

const KIND: &str = "drift";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DriftDefinition {
    kind: String,
    lookback: usize,
    lookforward: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct DriftWeights {
    drift: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DriftModel {
    lookback: usize,
    lookforward: usize,
    drift: f64,
}

impl DriftModel {
    pub fn new(lookback: usize, lookforward: usize, drift: f64) -> Self {
        Self {
            lookback,
            lookforward,
            drift,
        }
    }

    fn fit(set: &TrainingSet) -> Result<Self> {
        ensure!(!set.is_empty(), "training set is empty");
        let steps = set.lookforward.max(1) as f64;

        let per_step: Vec<f64> = set
            .examples
            .iter()
            .filter_map(|ex| {
                let last_input = ex.inputs.last()?.close;
                let last_target = *ex.targets.last()?;
                Some((last_target - last_input) / steps)
            })
            .collect();
        ensure!(!per_step.is_empty(), "training set has no usable examples");

        let drift = per_step.iter().sum::<f64>() / per_step.len() as f64;
        Ok(Self::new(set.lookback, set.lookforward, drift))
    }

    fn mean_abs_error(&self, set: &TrainingSet) -> f64 {
        let errors: Vec<f64> = set
            .examples
            .iter()
            .filter_map(|ex| {
                let predicted = self.predict(&ex.inputs).ok()?;
                Some((predicted - ex.targets.last()?).abs())
            })
            .collect();
        if errors.is_empty() {
            return 0.0;
        }
        errors.iter().sum::<f64>() / errors.len() as f64
    }
}

impl ForecastModel for DriftModel {
    fn predict(&self, window: &[ScaledRecord]) -> Result<f64> {
        if window.len() != self.lookback {
            bail!(
                "window has {} records, model expects {}",
                window.len(),
                self.lookback
            );
        }
        let Some(last) = window.last() else {
            bail!("empty window");
        };
        Ok(last.close + self.lookforward as f64 * self.drift)
    }

    fn lookback(&self) -> usize {
        self.lookback
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DriftBackend;

impl ModelBackend for DriftBackend {
    fn name(&self) -> &'static str {
        KIND
    }

    fn train(
        &self,
        set: &TrainingSet,
        hyper: &HyperParameters,
        dir: &Path,
    ) -> Result<TrainingMetrics> {
        ensure!(
            set.lookback == hyper.look_back && set.lookforward == hyper.look_forward,
            "training set shape {}x{} does not match hyper-parameters {}x{}",
            set.lookback,
            set.lookforward,
            hyper.look_back,
            hyper.look_forward
        );
        let model = DriftModel::fit(set)?;

        let definition = DriftDefinition {
            kind: KIND.to_string(),
            lookback: model.lookback,
            lookforward: model.lookforward,
        };
        save_json_atomic(&dir.join(MODEL_FILE), &definition)?;
        save_json_atomic(&dir.join(WEIGHTS_FILE), &DriftWeights { drift: model.drift })?;

        let mut metrics = TrainingMetrics::default();
        metrics.record(&hyper.loss_function, vec![model.mean_abs_error(set)]);
        Ok(metrics)
    }

    fn load(&self, dir: &Path) -> Result<Arc<dyn ForecastModel>> {
        let definition: DriftDefinition = load_json(&dir.join(MODEL_FILE))?
            .with_context(|| format!("{} has no {}", dir.display(), MODEL_FILE))?;
        ensure!(
            definition.kind == KIND,
            "{} holds a '{}' model, not '{}'",
            dir.display(),
            definition.kind,
            KIND
        );
        let weights: DriftWeights = load_json(&dir.join(WEIGHTS_FILE))?
            .with_context(|| format!("{} has no {}", dir.display(), WEIGHTS_FILE))?;
        ensure!(weights.drift.is_finite(), "drift weight is not finite");

        Ok(Arc::new(DriftModel::new(
            definition.lookback,
            definition.lookforward,
            weights.drift,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OhlcRecord;

    fn rising(n: usize, step: f64) -> Vec<ScaledRecord> {
        (0..n)
            .map(|i| ScaledRecord(OhlcRecord::splat(i as i64 + 1, i as f64 * step)))
            .collect()
    }

    fn hyper(lookback: usize) -> HyperParameters {
        HyperParameters {
            look_back: lookback,
            ..HyperParameters::default()
        }
    }

    #[test]
    fn learns_constant_slope_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let set = TrainingSet::convolve(&rising(20, 0.01), 4, 1);

        let metrics = DriftBackend.train(&set, &hyper(4), dir.path()).unwrap();
        assert!(metrics.last_metric_map["mae"] < 1e-9);

        let model = DriftBackend.load(dir.path()).unwrap();
        assert_eq!(model.lookback(), 4);
        let window = rising(4, 0.01);
        assert!((model.predict(&window).unwrap() - 0.04).abs() < 1e-9);
    }

    #[test]
    fn wrong_window_length_is_an_error() {
        let model = DriftModel::new(3, 1, 0.0);
        assert!(model.predict(&rising(2, 0.1)).is_err());
        assert!(model.predict(&rising(3, 0.1)).is_ok());
    }

    #[test]
    fn loading_foreign_or_missing_files_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DriftBackend.load(dir.path()).is_err());

        std::fs::write(
            dir.path().join(MODEL_FILE),
            r#"{"kind":"lstm","lookback":10,"lookforward":1}"#,
        )
        .unwrap();
        std::fs::write(dir.path().join(WEIGHTS_FILE), r#"{"drift":0.0}"#).unwrap();
        assert!(DriftBackend.load(dir.path()).is_err());
    }

    #[test]
    fn empty_training_set_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let set = TrainingSet::convolve(&rising(3, 0.1), 4, 1);
        assert!(DriftBackend.train(&set, &hyper(4), dir.path()).is_err());
    }
}
