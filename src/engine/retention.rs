use {
    super::sleep_or_cancel,
    crate::{config::PipelineConfig, data::PersistenceLog},
    std::{sync::Arc, time::Duration},
    tokio_util::sync::CancellationToken,
};

/// Prunes the rotated data directories at startup and then once per period.
pub struct RetentionAgent {
    config: Arc<PipelineConfig>,
}

impl RetentionAgent {
    pub fn new(config: Arc<PipelineConfig>) -> Self {
        Self { config }
    }

    pub async fn run(self, cancel: CancellationToken) {
        let period = Duration::from_secs(self.config.retention_period_secs);
        loop {
            let removed = self.prune_once().await;
            if removed > 0 {
                log::info!("🧹 Retention removed {} file(s)", removed);
            }
            if !sleep_or_cancel(&cancel, period).await {
                break;
            }
        }
        log::info!("🧹 Retention stopped");
    }

    /// One pass over every rotated directory. Failures are logged per directory.
    pub async fn prune_once(&self) -> usize {
        let mut removed = 0;
        for dir in self.config.layout.rotated_dirs() {
            match PersistenceLog::prune_async(dir.clone(), self.config.retention_secs).await {
                Ok(n) => removed += n,
                Err(e) => log::error!("Pruning {} failed: {:#}", dir.display(), e),
            }
        }
        removed
    }
}
