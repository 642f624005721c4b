use {
    crate::{domain::Interval, utils::epoch_sec_to_utc},
    chrono::{DateTime, Utc},
    std::path::PathBuf,
};

/// A trained model on disk. Never mutated once published.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelArtifact {
    pub interval: Interval,
    pub created_at: DateTime<Utc>,
    pub location: PathBuf,
}

impl ModelArtifact {
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        (now - self.created_at).num_seconds()
    }

    pub fn is_fresh(&self, now: DateTime<Utc>, max_age_secs: i64) -> bool {
        self.age_secs(now) < max_age_secs
    }
}

impl std::fmt::Display for ModelArtifact {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} model created {} ({})",
            self.interval,
            epoch_sec_to_utc(self.created_at.timestamp()),
            self.location.display()
        )
    }
}
