use super::{AggregateRecorder, Record, RecordStorage, RecordValue, Recorder};
use log::info;

/// Writes records as an aligned key-value table through [`log::info`].
///
/// ```text
/// ---------------------------------------
/// | entropy             | 0.68          |
/// | explained_variance  | 0.12          |
/// | total_timesteps     | 2.0e3         |
/// ---------------------------------------
/// ```
#[derive(Default)]
pub struct TabularRecorder {
    storage: RecordStorage,
}

impl TabularRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self {
            storage: RecordStorage::new(),
        }
    }

    fn format_value(v: &RecordValue) -> Option<String> {
        match v {
            RecordValue::Scalar(v) => Some(Self::format_scalar(*v)),
            RecordValue::String(s) => Some(s.clone()),
            // Arrays are not shown in the table
            RecordValue::Array1(_) | RecordValue::Array2(..) => None,
        }
    }

    fn format_scalar(v: f32) -> String {
        let a = v.abs();
        if v.fract() == 0.0 && a < 1e7 {
            format!("{}", v as i64)
        } else if a != 0.0 && (a < 1e-3 || a >= 1e4) {
            format!("{:.3e}", v)
        } else {
            format!("{:.4}", v)
        }
    }

    /// Renders the record as lines of a table, keys sorted.
    pub fn table(record: &Record) -> Vec<String> {
        let mut rows: Vec<(String, String)> = record
            .iter()
            .filter_map(|(k, v)| Self::format_value(v).map(|v| (k.clone(), v)))
            .collect();
        rows.sort();

        let kw = rows.iter().map(|(k, _)| k.len()).max().unwrap_or(0);
        let vw = rows.iter().map(|(_, v)| v.len()).max().unwrap_or(0);
        let dashes = "-".repeat(kw + vw + 7);

        let mut lines = vec![dashes.clone()];
        for (k, v) in rows.iter() {
            lines.push(format!("| {:<kw$} | {:<vw$} |", k, v, kw = kw, vw = vw));
        }
        lines.push(dashes);
        lines
    }
}

impl Recorder for TabularRecorder {
    fn write(&mut self, record: Record) {
        for line in Self::table(&record) {
            info!("{}", line);
        }
    }
}

impl AggregateRecorder for TabularRecorder {
    fn store(&mut self, record: Record) {
        self.storage.store(record);
    }

    fn flush(&mut self, _step: i64) {
        if self.storage.is_empty() {
            return;
        }
        let record = self.storage.aggregate();
        self.write(record);
    }
}
