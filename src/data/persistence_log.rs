//! Append-only, time-rotated CSV output.
//!
//! Every file in a rotated directory is named `<unix seconds>.csv`, the second
//! it was created. Appends go to the newest file until it is older than the
//! expiration, at which point a new file with a fresh header is started.

use {
    crate::{
        config::{DF, PERSISTENCE},
        data::csv_format::{CsvRecord, format_chunk},
        utils::{epoch_sec_to_utc, now_unix},
    },
    anyhow::{Context, Result},
    std::{
        fs::{self, OpenOptions},
        io::Write,
        path::{Path, PathBuf},
    },
};

#[derive(Debug, Clone, Copy)]
pub struct PersistenceLog {
    file_expiration_secs: i64,
}

impl PersistenceLog {
    pub fn new(file_expiration_secs: i64) -> Self {
        Self {
            file_expiration_secs,
        }
    }

    pub fn append<T: CsvRecord>(&self, dir: &Path, records: &[T]) -> Result<Option<PathBuf>> {
        self.append_at(dir, records, now_unix())
    }

    /// Appends `records` to the active file of `dir` as of `now`, rotating if needed.
    /// Returns the file written, or `None` for an empty chunk.
    pub fn append_at<T: CsvRecord>(
        &self,
        dir: &Path,
        records: &[T],
        now: i64,
    ) -> Result<Option<PathBuf>> {
        if records.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

        let newest = rotated_files(dir)?.into_iter().map(|(ts, _)| ts).max();
        let (target, new_file) = match newest {
            Some(ts) if now - ts <= self.file_expiration_secs => (file_for(dir, ts), false),
            _ => (file_for(dir, now), true),
        };

        if DF.log_rotation && new_file {
            log::info!(
                "🗂️ Rotating {} -> {} (previous file from {})",
                dir.display(),
                target.display(),
                newest.map(epoch_sec_to_utc).unwrap_or_else(|| "never".into())
            );
        }

        // Header only when the file does not exist yet, so a same-second rotation never writes two
        let with_header = new_file && !target.exists();
        let chunk = format_chunk(records, with_header);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .with_context(|| format!("opening {}", target.display()))?;
        file.write_all(chunk.as_bytes())
            .with_context(|| format!("appending to {}", target.display()))?;

        Ok(Some(target))
    }

    pub async fn append_async<T>(&self, dir: PathBuf, records: Vec<T>) -> Result<Option<PathBuf>>
    where
        T: CsvRecord + Send + 'static,
    {
        let log = *self;
        tokio::task::spawn_blocking(move || log.append(&dir, &records))
            .await
            .context("persistence append task panicked")?
    }

    pub fn prune(dir: &Path, retention_secs: i64) -> Result<usize> {
        Self::prune_at(dir, retention_secs, now_unix())
    }

    /// Deletes rotated files created more than `retention_secs` before `now`.
    /// A missing directory is not an error.
    pub fn prune_at(dir: &Path, retention_secs: i64, now: i64) -> Result<usize> {
        if !dir.exists() {
            return Ok(0);
        }

        let mut removed = 0;
        for (ts, path) in rotated_files(dir)? {
            if now - ts > retention_secs {
                fs::remove_file(&path).with_context(|| format!("removing {}", path.display()))?;
                log::info!("🧹 Pruned {} ({})", path.display(), epoch_sec_to_utc(ts));
                removed += 1;
            }
        }
        Ok(removed)
    }

    pub async fn prune_async(dir: PathBuf, retention_secs: i64) -> Result<usize> {
        tokio::task::spawn_blocking(move || Self::prune(&dir, retention_secs))
            .await
            .context("prune task panicked")?
    }
}

fn file_for(dir: &Path, ts: i64) -> PathBuf {
    dir.join(format!("{}.{}", ts, PERSISTENCE.csv_ext))
}

/// Files of `dir` whose stem parses as unix seconds. Anything else is ignored.
fn rotated_files(dir: &Path) -> Result<Vec<(i64, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let ts = path
            .file_stem()
            .and_then(|s| s.to_str())
            .and_then(|s| s.parse::<i64>().ok());
        if let Some(ts) = ts {
            files.push((ts, path));
        }
    }
    Ok(files)
}
