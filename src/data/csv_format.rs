use {
    crate::domain::{OhlcRecord, Prediction, ScaledRecord},
    itertools::Itertools,
};

/// A flat record the persistence log can write as one delimited line.
///
/// Columns are always emitted sorted by name so the header of a file does not
/// depend on field declaration order.
pub trait CsvRecord {
    fn csv_columns(&self) -> Vec<(&'static str, String)>;
}

fn sorted_columns<T: CsvRecord>(record: &T) -> Vec<(&'static str, String)> {
    let mut columns = record.csv_columns();
    columns.sort_by(|a, b| a.0.cmp(b.0));
    columns
}

pub fn csv_header<T: CsvRecord>(sample: &T) -> String {
    sorted_columns(sample).iter().map(|(name, _)| *name).join(",")
}

pub fn csv_line<T: CsvRecord>(record: &T) -> String {
    sorted_columns(record).into_iter().map(|(_, value)| value).join(",")
}

/// Formats a whole chunk up front; `with_header` prefixes the header line.
pub fn format_chunk<T: CsvRecord>(records: &[T], with_header: bool) -> String {
    let mut out = String::new();
    if let (true, Some(first)) = (with_header, records.first()) {
        out.push_str(&csv_header(first));
        out.push('\n');
    }
    for record in records {
        out.push_str(&csv_line(record));
        out.push('\n');
    }
    out
}

impl CsvRecord for OhlcRecord {
    fn csv_columns(&self) -> Vec<(&'static str, String)> {
        vec![
            ("date", self.date.to_string()),
            ("open", self.open.to_string()),
            ("high", self.high.to_string()),
            ("low", self.low.to_string()),
            ("close", self.close.to_string()),
            ("weightedAverage", self.weighted_average.to_string()),
            ("volume", self.volume.to_string()),
            ("quoteVolume", self.quote_volume.to_string()),
        ]
    }
}

impl CsvRecord for ScaledRecord {
    fn csv_columns(&self) -> Vec<(&'static str, String)> {
        self.0.csv_columns()
    }
}

impl CsvRecord for Prediction {
    fn csv_columns(&self) -> Vec<(&'static str, String)> {
        vec![
            ("close", self.close.to_string()),
            ("unixTime", self.unix_time.to_string()),
            ("interval", self.interval.to_string()),
            ("referenceClose", self.reference_close.to_string()),
        ]
    }
}
