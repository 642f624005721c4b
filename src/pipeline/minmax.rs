use {
    crate::{
        data::{load_json, save_json_atomic},
        domain::{OhlcField, OhlcRecord},
    },
    anyhow::Result,
    serde::{Deserialize, Serialize},
    std::path::Path,
    strum::IntoEnumIterator,
};

/// Per-field bounds captured from one training batch. The only input a
/// [`Scaler`](crate::pipeline::Scaler) is ever built from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinMaxSnapshot {
    pub minimum: OhlcRecord,
    pub maximum: OhlcRecord,
}

impl MinMaxSnapshot {
    pub fn load(path: &Path) -> Result<Option<Self>> {
        load_json(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json_atomic(path, self)
    }
}

/// Single-pass min/max reducer. Owned by one training run; `&mut self` keeps it
/// that way.
#[derive(Debug, Default)]
pub struct MinMaxTracker {
    bounds: Option<(OhlcRecord, OhlcRecord)>,
    assessed: usize,
}

impl MinMaxTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn assess(&mut self, record: &OhlcRecord) {
        self.assessed += 1;
        let Some((min, max)) = self.bounds.as_mut() else {
            self.bounds = Some((*record, *record));
            return;
        };

        min.date = min.date.min(record.date);
        max.date = max.date.max(record.date);
        for field in OhlcField::iter() {
            let value = record.get(field);
            if value < min.get(field) {
                min.set(field, value);
            }
            if value > max.get(field) {
                max.set(field, value);
            }
        }
    }

    pub fn assess_all<'a>(&mut self, records: impl IntoIterator<Item = &'a OhlcRecord>) {
        for record in records {
            self.assess(record);
        }
    }

    pub fn assessed(&self) -> usize {
        self.assessed
    }

    /// `None` until at least one record has been assessed.
    pub fn snapshot(&self) -> Option<MinMaxSnapshot> {
        self.bounds.map(|(minimum, maximum)| MinMaxSnapshot { minimum, maximum })
    }
}
