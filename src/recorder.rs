//! Append-only CSV log of fetched constraint records.
//!
//! Every successful poll is appended so readings can be analysed after the
//! dashboard has closed. The provider serves the same reading for about a
//! minute, so rows already present in the file are not written again.

use std::collections::{BTreeMap, HashSet};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use gridwatch_odp::Batch;
use gridwatch_types::{format_value, ConstraintRecord};
use tracing::debug;

/// Column order of the log.
pub const HEADER: [&str; 10] = [
    "timestamp",
    "constraint_id",
    "present_amps_value",
    "trim_amps",
    "release_limit_amps",
    "breach_flag",
    "constraint_description",
    "der_name",
    "value",
    "unit",
];

/// Hours of reading time, back from the newest row, checked for duplicates.
pub const DEDUP_WINDOW_HOURS: i64 = 24;

/// Rows known to be in the file, grouped by reading time.
#[derive(Debug, Default)]
struct SeenRows {
    by_time: BTreeMap<DateTime<Utc>, HashSet<String>>,
}

impl SeenRows {
    fn contains(&self, ts: DateTime<Utc>, row: &str) -> bool {
        self.by_time.get(&ts).is_some_and(|rows| rows.contains(row))
    }

    fn insert(&mut self, ts: DateTime<Utc>, row: String) {
        self.by_time.entry(ts).or_default().insert(row);
    }

    /// Forget rows older than the window before the newest reading.
    fn prune(&mut self, window: Duration) {
        let Some(&newest) = self.by_time.keys().next_back() else {
            return;
        };
        let cutoff = newest - window;
        self.by_time = self.by_time.split_off(&cutoff);
    }

    fn len(&self) -> usize {
        self.by_time.values().map(HashSet::len).sum()
    }
}

/// Appends batches to a CSV file, dropping duplicate rows.
///
/// Duplicates are checked against rows from the last
/// [`DEDUP_WINDOW_HOURS`] of reading time, so memory stays bounded on
/// long runs.
#[derive(Debug)]
pub struct CsvRecorder {
    path: PathBuf,
    /// Rows known to be in the file. Loaded on first write, and again after
    /// a failed one.
    seen: Option<SeenRows>,
}

impl CsvRecorder {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            seen: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append the batch's records. Returns how many rows were written.
    pub fn record(&mut self, batch: &Batch) -> io::Result<usize> {
        let mut seen = match self.seen.take() {
            Some(seen) => seen,
            None => self.load_existing()?,
        };

        let mut rows: Vec<(DateTime<Utc>, String)> = Vec::new();
        for record in &batch.records {
            let row = format_row(record);
            let ts = record.timestamp;
            if !seen.contains(ts, &row) && !rows.iter().any(|(t, r)| *t == ts && *r == row) {
                rows.push((ts, row));
            }
        }

        // On error `seen` stays unset and is reloaded from what reached the file
        self.append(&rows)?;

        let written = rows.len();
        for (ts, row) in rows {
            seen.insert(ts, row);
        }
        seen.prune(Duration::hours(DEDUP_WINDOW_HOURS));
        debug!(path = %self.path.display(), written, remembered = seen.len(), "recorded batch");
        self.seen = Some(seen);
        Ok(written)
    }

    fn append(&self, rows: &[(DateTime<Utc>, String)]) -> io::Result<()> {
        let is_new = fs::metadata(&self.path).map(|m| m.len() == 0).unwrap_or(true);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;

        let mut out = String::new();
        if is_new {
            out.push_str(&HEADER.join(","));
            out.push('\n');
        }
        for (_, row) in rows {
            out.push_str(row);
            out.push('\n');
        }
        file.write_all(out.as_bytes())
    }

    fn load_existing(&self) -> io::Result<SeenRows> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(SeenRows::default()),
            Err(e) => return Err(e),
        };

        let mut seen = SeenRows::default();
        for line in BufReader::new(file).lines().skip(1) {
            let line = line?;
            // Rows we write always start with an RFC 3339 timestamp
            let parsed = line
                .split(',')
                .next()
                .and_then(|field| DateTime::parse_from_rfc3339(field).ok());
            if let Some(ts) = parsed {
                seen.insert(ts.with_timezone(&Utc), line);
            }
        }
        seen.prune(Duration::hours(DEDUP_WINDOW_HOURS));
        Ok(seen)
    }
}

/// One record as a CSV line, without the trailing newline.
pub fn format_row(record: &ConstraintRecord) -> String {
    let readings = record.readings.as_ref();
    let fields = [
        record.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        record.id.clone(),
        readings.map(|r| format_value(r.present_amps)).unwrap_or_default(),
        readings.map(|r| format_value(r.trim_amps)).unwrap_or_default(),
        readings
            .and_then(|r| r.release_limit_amps)
            .map(format_value)
            .unwrap_or_default(),
        readings.map(|r| r.breach.to_string()).unwrap_or_default(),
        record.constraint_type.clone(),
        record.location.clone().unwrap_or_default(),
        format_value(record.value),
        record.unit.clone().unwrap_or_default(),
    ];

    fields
        .iter()
        .map(|field| quote(field))
        .collect::<Vec<_>>()
        .join(",")
}

fn quote(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
