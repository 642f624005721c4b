mod backend;
mod drift;
mod registry;

pub use {
    backend::{
        ForecastModel, HYPER_PARAMETERS_FILE, METRICS_FILE, MINMAX_FILE, MODEL_FILE,
        ModelBackend, TrainingMetrics, WEIGHTS_FILE,
    },
    drift::{DriftBackend, DriftModel},
    registry::{ModelRegistry, RegistryError},
};
