use {
    crate::domain::Interval,
    anyhow::{Context, Result},
    serde::{Serialize, de::DeserializeOwned},
    std::{
        collections::BTreeMap,
        fs::{self, File},
        io::{BufReader, BufWriter, Write},
        path::Path,
    },
};

/// `None` when the file does not exist yet.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let reader = BufReader::new(file);
    let value = serde_json::from_reader(reader)
        .with_context(|| format!("parsing {}", path.display()))?;
    Ok(Some(value))
}

/// Writes to a sibling temp file and renames it over `path`, so a reader sees
/// either the old content or the new, never a partial file.
pub fn save_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {}", parent.display()))?;
    }
    let tmp = path.with_extension("json.tmp");
    {
        let file = File::create(&tmp).with_context(|| format!("creating {}", tmp.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
    }
    fs::rename(&tmp, path).with_context(|| format!("renaming into {}", path.display()))?;
    Ok(())
}

/// Marker file content: a map of interval name to the next unix time to fetch from.
type MarkerMap = BTreeMap<Interval, i64>;

pub fn load_marker(path: &Path, interval: Interval) -> Result<Option<i64>> {
    let map: Option<MarkerMap> = load_json(path)?;
    Ok(map.and_then(|m| m.get(&interval).copied()))
}

pub fn save_marker(path: &Path, interval: Interval, next_start: i64) -> Result<()> {
    let mut map: MarkerMap = load_json(path).unwrap_or_default().unwrap_or_default();
    map.insert(interval, next_start);
    save_json_atomic(path, &map)
}
