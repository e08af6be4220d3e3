//! CSV ingestion for the three raw store datasets.
//!
//! This module is the **read** side only: it turns CSV text into raw rows and
//! an [`InMemoryStore`]. It does not validate timestamps, statuses, weekdays,
//! or zone names; the calendar and timeline own those defaulting policies.
//! `sw-db` persists the rows produced here.
//!
//! ## Files and column contract (case-insensitive, order-independent)
//!
//! | File               | Columns                                                        |
//! |--------------------|----------------------------------------------------------------|
//! | `store_status.csv` | `store_id`, `status`, `timestamp_utc`                          |
//! | `menu_hours.csv`   | `store_id`, `dayOfWeek` (or `day`), `start_time_local`, `end_time_local` |
//! | `timezones.csv`    | `store_id`, `timezone_str`                                     |
//!
//! A record with an empty `store_id` or too few fields is rejected and
//! counted; every other record is kept verbatim.

use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::path::Path;

use sw_schemas::{RawBusinessHours, RawSample, StoreTimezone};
use tracing::info;

use crate::memory::InMemoryStore;

pub const STORE_STATUS_FILE: &str = "store_status.csv";
pub const MENU_HOURS_FILE: &str = "menu_hours.csv";
pub const TIMEZONES_FILE: &str = "timezones.csv";

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors produced by CSV parsing in this module.
#[derive(Debug)]
pub enum CsvIngestError {
    /// An I/O or CSV-library error on the file as a whole.
    Io(String),
    /// The header row is missing a required column.
    MissingHeader(String),
}

impl fmt::Display for CsvIngestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CsvIngestError::Io(msg) => write!(f, "csv io error: {msg}"),
            CsvIngestError::MissingHeader(col) => {
                write!(f, "csv missing required header column: '{col}'")
            }
        }
    }
}

impl std::error::Error for CsvIngestError {}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Rows accepted from one file plus the count of rejected records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsvLoad<T> {
    pub rows: Vec<T>,
    pub rejected: usize,
}

/// Per-file coverage for a data-directory load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub samples_read: usize,
    pub samples_rejected: usize,
    pub hours_read: usize,
    pub hours_rejected: usize,
    pub timezones_read: usize,
    pub timezones_rejected: usize,
}

/// Everything a data directory holds, as raw rows.
#[derive(Debug, Clone, Default)]
pub struct DataDir {
    pub samples: Vec<RawSample>,
    pub hours: Vec<RawBusinessHours>,
    pub timezones: Vec<StoreTimezone>,
    pub summary: IngestSummary,
}

impl DataDir {
    pub fn into_store(self) -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for s in self.samples {
            store.push_sample(s);
        }
        for h in self.hours {
            store.push_hours(h);
        }
        for tz in self.timezones {
            store.set_timezone(tz.store_id, tz.zone_id);
        }
        store
    }
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Load `store_status.csv` (required), `menu_hours.csv` and `timezones.csv`
/// (optional; absent means "no configuration") from `dir`.
pub fn load_data_dir(dir: &Path) -> Result<DataDir, CsvIngestError> {
    let samples = parse_status_csv(open(&dir.join(STORE_STATUS_FILE))?)?;

    let hours_path = dir.join(MENU_HOURS_FILE);
    let hours = if hours_path.exists() {
        parse_hours_csv(open(&hours_path)?)?
    } else {
        CsvLoad { rows: Vec::new(), rejected: 0 }
    };

    let tz_path = dir.join(TIMEZONES_FILE);
    let timezones = if tz_path.exists() {
        parse_timezones_csv(open(&tz_path)?)?
    } else {
        CsvLoad { rows: Vec::new(), rejected: 0 }
    };

    let summary = IngestSummary {
        samples_read: samples.rows.len(),
        samples_rejected: samples.rejected,
        hours_read: hours.rows.len(),
        hours_rejected: hours.rejected,
        timezones_read: timezones.rows.len(),
        timezones_rejected: timezones.rejected,
    };
    info!(
        dir = %dir.display(),
        samples = summary.samples_read,
        hours = summary.hours_read,
        timezones = summary.timezones_read,
        "loaded data dir"
    );

    Ok(DataDir {
        samples: samples.rows,
        hours: hours.rows,
        timezones: timezones.rows,
        summary,
    })
}

pub fn parse_status_csv<R: Read>(src: R) -> Result<CsvLoad<RawSample>, CsvIngestError> {
    parse_with(src, &[&["store_id"], &["status"], &["timestamp_utc"]], |f| {
        RawSample::new(f[0], f[1], f[2])
    })
}

pub fn parse_hours_csv<R: Read>(src: R) -> Result<CsvLoad<RawBusinessHours>, CsvIngestError> {
    parse_with(
        src,
        &[
            &["store_id"],
            &["dayofweek", "day_of_week", "day"],
            &["start_time_local"],
            &["end_time_local"],
        ],
        |f| RawBusinessHours::new(f[0], f[1], f[2], f[3]),
    )
}

pub fn parse_timezones_csv<R: Read>(src: R) -> Result<CsvLoad<StoreTimezone>, CsvIngestError> {
    parse_with(src, &[&["store_id"], &["timezone_str", "timezone"]], |f| {
        StoreTimezone {
            store_id: f[0].to_string(),
            zone_id: f[1].to_string(),
        }
    })
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn open(path: &Path) -> Result<std::fs::File, CsvIngestError> {
    std::fs::File::open(path)
        .map_err(|e| CsvIngestError::Io(format!("open '{}': {e}", path.display())))
}

/// Shared reader: `columns[i]` lists accepted header aliases for field `i`;
/// `build` receives the fields in that order.
fn parse_with<R, T, F>(
    src: R,
    columns: &[&[&str]],
    build: F,
) -> Result<CsvLoad<T>, CsvIngestError>
where
    R: Read,
    F: Fn(&[&str]) -> T,
{
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(src);

    let headers = match rdr.headers() {
        Ok(h) => h.clone(),
        Err(e) => return Err(CsvIngestError::Io(e.to_string())),
    };
    if headers.is_empty() {
        // Empty input: nothing to load.
        return Ok(CsvLoad { rows: Vec::new(), rejected: 0 });
    }

    let col_idx = build_col_index(&headers, columns)?;

    let mut rows = Vec::new();
    let mut rejected = 0usize;

    for rec in rdr.records() {
        let rec = match rec {
            Ok(r) => r,
            Err(_) => {
                rejected += 1;
                continue;
            }
        };
        let mut fields: Vec<&str> = Vec::with_capacity(col_idx.len());
        for &i in &col_idx {
            match rec.get(i) {
                Some(v) => fields.push(v),
                None => break,
            }
        }
        if fields.len() != col_idx.len() || fields[0].is_empty() {
            rejected += 1;
            continue;
        }
        rows.push(build(&fields));
    }

    Ok(CsvLoad { rows, rejected })
}

/// Resolve each logical column to its header position.
fn build_col_index(
    headers: &csv::StringRecord,
    columns: &[&[&str]],
) -> Result<Vec<usize>, CsvIngestError> {
    let idx: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h.trim().trim_start_matches('\u{feff}').to_ascii_lowercase(), i))
        .collect();

    columns
        .iter()
        .map(|aliases| {
            aliases
                .iter()
                .find_map(|a| idx.get(*a).copied())
                .ok_or_else(|| CsvIngestError::MissingHeader(aliases[0].to_string()))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
