//! Filesystem-backed catalog of trained models.
//!
//! Layout: `<model_dir>/<interval>/<M_D_YYYY_h_m_s>/`. A folder only appears
//! under its final name once every file in it has been written (see
//! [`ModelRegistry::publish`]), so anything a scan finds is complete.

use {
    crate::{
        domain::{Interval, ModelArtifact},
        utils::{encode_folder_timestamp, now_utc, parse_folder_timestamp},
    },
    anyhow::Context,
    chrono::{DateTime, Utc},
    futures::{Stream, stream},
    std::{
        collections::{HashSet, VecDeque},
        fs,
        path::{Path, PathBuf},
        str::FromStr,
        sync::Arc,
        time::Duration,
    },
    thiserror::Error,
    tokio::sync::Notify,
    tokio_util::sync::CancellationToken,
};

const STAGING_PREFIX: &str = ".tmp-";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("model directory {path} is unreadable")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("an artifact is already published at {0}")]
    AlreadyPublished(PathBuf),
    #[error("writing artifact files into {path} failed")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },
}

pub struct ModelRegistry {
    model_dir: PathBuf,
    scan_period: Duration,
    published: Notify,
}

impl ModelRegistry {
    pub fn new(model_dir: impl Into<PathBuf>, scan_period: Duration) -> Self {
        Self {
            model_dir: model_dir.into(),
            scan_period,
            published: Notify::new(),
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }

    pub fn interval_dir(&self, interval: Interval) -> PathBuf {
        self.model_dir.join(interval.to_string())
    }

    /// Every artifact on disk, ordered by interval then creation time.
    /// A missing model directory is an empty registry.
    pub fn list(&self) -> Result<Vec<ModelArtifact>, RegistryError> {
        if !self.model_dir.exists() {
            return Ok(Vec::new());
        }

        let mut artifacts = Vec::new();
        for interval_path in read_subdirs(&self.model_dir)? {
            let Some(name) = folder_name(&interval_path) else {
                continue;
            };
            if name.starts_with('.') {
                continue;
            }
            let Ok(interval) = Interval::from_str(name) else {
                log::warn!("⚠️ Skipping unknown interval folder {}", interval_path.display());
                continue;
            };
            artifacts.extend(self.scan_interval(interval, &interval_path)?);
        }

        artifacts.sort_by_key(|a| (a.interval, a.created_at));
        Ok(artifacts)
    }

    pub fn list_interval(&self, interval: Interval) -> Result<Vec<ModelArtifact>, RegistryError> {
        let dir = self.interval_dir(interval);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut artifacts = self.scan_interval(interval, &dir)?;
        artifacts.sort_by_key(|a| a.created_at);
        Ok(artifacts)
    }

    fn scan_interval(
        &self,
        interval: Interval,
        dir: &Path,
    ) -> Result<Vec<ModelArtifact>, RegistryError> {
        let mut artifacts = Vec::new();
        for path in read_subdirs(dir)? {
            let Some(name) = folder_name(&path) else {
                continue;
            };
            // Staging folders and anything else hidden
            if name.starts_with('.') {
                continue;
            }
            match parse_folder_timestamp(name) {
                Ok(created_at) => artifacts.push(ModelArtifact {
                    interval,
                    created_at,
                    location: path,
                }),
                Err(e) => log::warn!("⚠️ Skipping model folder {}: {:#}", path.display(), e),
            }
        }
        Ok(artifacts)
    }

    /// Newest artifact of `interval`, by encoded creation time.
    pub fn latest(&self, interval: Interval) -> Result<Option<ModelArtifact>, RegistryError> {
        Ok(self.list_interval(interval)?.pop())
    }

    pub fn latest_if_fresh(
        &self,
        interval: Interval,
        max_age_secs: i64,
    ) -> Result<Option<ModelArtifact>, RegistryError> {
        self.latest_if_fresh_at(interval, max_age_secs, now_utc())
    }

    pub fn latest_if_fresh_at(
        &self,
        interval: Interval,
        max_age_secs: i64,
        now: DateTime<Utc>,
    ) -> Result<Option<ModelArtifact>, RegistryError> {
        Ok(self
            .latest(interval)?
            .filter(|artifact| artifact.is_fresh(now, max_age_secs)))
    }

    /// Waits for an artifact of `interval` created after `after` (any artifact
    /// when `after` is `None`) and returns the newest such one. Re-scans every
    /// scan period and whenever this registry publishes. `None` on cancellation.
    pub async fn next_after(
        &self,
        interval: Interval,
        after: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Option<ModelArtifact> {
        loop {
            let notified = self.published.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            match self.latest(interval) {
                Ok(Some(artifact)) if after.is_none_or(|ts| artifact.created_at > ts) => {
                    return Some(artifact);
                }
                Ok(_) => {}
                Err(e) => log::error!("Scanning {} models failed: {:#}", interval, e),
            }

            tokio::select! {
                _ = cancel.cancelled() => return None,
                _ = &mut notified => {}
                _ = tokio::time::sleep(self.scan_period) => {}
            }
        }
    }

    /// Infinite stream of artifacts that were not on disk when the stream was
    /// created, in discovery order. Ends only on cancellation.
    pub fn stream_new_artifacts(
        self: &Arc<Self>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = ModelArtifact> + Send + 'static {
        let seen: HashSet<PathBuf> = match self.list() {
            Ok(existing) => existing.into_iter().map(|a| a.location).collect(),
            Err(e) => {
                log::error!("Initial model scan failed: {:#}", e);
                HashSet::new()
            }
        };

        let state = (Arc::clone(self), cancel, seen, VecDeque::<ModelArtifact>::new());
        stream::unfold(state, |(registry, cancel, mut seen, mut pending)| async move {
            loop {
                if let Some(artifact) = pending.pop_front() {
                    return Some((artifact, (registry, cancel, seen, pending)));
                }

                let notified = registry.published.notified();
                tokio::pin!(notified);
                notified.as_mut().enable();

                match registry.list() {
                    Ok(all) => {
                        let mut fresh: Vec<ModelArtifact> = all
                            .into_iter()
                            .filter(|a| !seen.contains(&a.location))
                            .collect();
                        fresh.sort_by_key(|a| a.created_at);
                        for artifact in fresh {
                            seen.insert(artifact.location.clone());
                            pending.push_back(artifact);
                        }
                    }
                    Err(e) => log::error!("Model scan failed: {:#}", e),
                }
                if !pending.is_empty() {
                    continue;
                }

                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = &mut notified => {}
                    _ = tokio::time::sleep(registry.scan_period) => {}
                }
            }
        })
    }

    /// Writes a new artifact via `write` into a hidden staging folder, then
    /// renames it to its final name and wakes every waiter.
    pub fn publish<F>(
        &self,
        interval: Interval,
        created_at: DateTime<Utc>,
        write: F,
    ) -> Result<ModelArtifact, RegistryError>
    where
        F: FnOnce(&Path) -> anyhow::Result<()>,
    {
        let parent = self.interval_dir(interval);
        let folder = encode_folder_timestamp(&created_at);
        let location = parent.join(&folder);
        if location.exists() {
            return Err(RegistryError::AlreadyPublished(location));
        }

        let staging = parent.join(format!("{}{}", STAGING_PREFIX, folder));
        let staged = (|| -> anyhow::Result<()> {
            if staging.exists() {
                fs::remove_dir_all(&staging)
                    .with_context(|| format!("clearing stale {}", staging.display()))?;
            }
            fs::create_dir_all(&staging)
                .with_context(|| format!("creating {}", staging.display()))?;
            write(&staging)?;
            fs::rename(&staging, &location)
                .with_context(|| format!("renaming into {}", location.display()))?;
            Ok(())
        })();

        if let Err(source) = staged {
            if let Err(e) = fs::remove_dir_all(&staging) {
                log::warn!("Could not clear {}: {}", staging.display(), e);
            }
            return Err(RegistryError::WriteFailed {
                path: location,
                source,
            });
        }

        self.published.notify_waiters();
        Ok(ModelArtifact {
            interval,
            created_at,
            location,
        })
    }
}

fn folder_name(path: &Path) -> Option<&str> {
    path.file_name().and_then(|n| n.to_str())
}

fn read_subdirs(dir: &Path) -> Result<Vec<PathBuf>, RegistryError> {
    let unreadable = |source| RegistryError::Unreadable {
        path: dir.to_path_buf(),
        source,
    };
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).map_err(unreadable)? {
        let path = entry.map_err(unreadable)?.path();
        if path.is_dir() {
            dirs.push(path);
        }
    }
    Ok(dirs)
}
