//! On-disk layout of the pipeline's root directory
use {
    crate::domain::Interval,
    std::path::{Path, PathBuf},
};

/// Directory and file names under the root data directory.
pub struct PersistenceConfig {
    pub raw_dir: &'static str,
    pub normalized_dir: &'static str,
    pub predictions_dir: &'static str,
    pub minmax_dir: &'static str,
    pub model_dir: &'static str,
    pub training_dir: &'static str,
    pub last_timestamp_file: &'static str,
    /// Extension of rotated CSV files.
    pub csv_ext: &'static str,
}

pub const PERSISTENCE: PersistenceConfig = PersistenceConfig {
    raw_dir: "Data",
    normalized_dir: "NormalizedData",
    predictions_dir: "Predictions",
    minmax_dir: "MinMaxData",
    model_dir: "Model",
    training_dir: "TrainingData",
    last_timestamp_file: "LastTimeStamp.json",
    csv_ext: "csv",
};

/// Resolves every path the pipeline reads or writes from one root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_dir(&self) -> PathBuf {
        self.root.join(PERSISTENCE.raw_dir)
    }

    pub fn normalized_dir(&self) -> PathBuf {
        self.root.join(PERSISTENCE.normalized_dir)
    }

    pub fn predictions_dir(&self) -> PathBuf {
        self.root.join(PERSISTENCE.predictions_dir)
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.join(PERSISTENCE.model_dir)
    }

    /// Example: "<root>/MinMaxData/minmax_fiveMinute.json"
    pub fn minmax_path(&self, interval: Interval) -> PathBuf {
        self.root
            .join(PERSISTENCE.minmax_dir)
            .join(format!("minmax_{}.json", interval))
    }

    /// Example: "<root>/TrainingData/training_oneDay.csv"
    pub fn training_data_path(&self, interval: Interval) -> PathBuf {
        self.root
            .join(PERSISTENCE.training_dir)
            .join(format!("training_{}.{}", interval, PERSISTENCE.csv_ext))
    }

    /// Example: "<root>/fiveMinute/LastTimeStamp.json"
    pub fn last_timestamp_path(&self, interval: Interval) -> PathBuf {
        self.root
            .join(interval.to_string())
            .join(PERSISTENCE.last_timestamp_file)
    }

    /// Directories holding rotated CSV output, in pruning order.
    pub fn rotated_dirs(&self) -> [PathBuf; 3] {
        [self.raw_dir(), self.normalized_dir(), self.predictions_dir()]
    }
}
