//! Where finished reports go.
//!
//! A sink stores a [`ReportTable`] under a job id and hands back an opaque
//! location string; `read` turns that location back into CSV bytes.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::table::{ReportTable, SkippedStore};

pub const MANIFEST_SCHEMA_VERSION: i32 = 1;

pub trait ReportSink: Send + Sync {
    /// Persist `table` for `job_id`; returns the output location.
    fn persist(&self, job_id: Uuid, table: &ReportTable) -> Result<String>;

    /// CSV bytes previously persisted at `location`.
    fn read(&self, location: &str) -> Result<Vec<u8>>;
}

// ---------------------------------------------------------------------------
// Filesystem sink
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportManifest {
    pub schema_version: i32,
    pub job_id: Uuid,
    pub as_of_utc: DateTime<Utc>,
    pub generated_at_utc: DateTime<Utc>,
    pub config_hash: String,
    pub rows: usize,
    pub skipped: Vec<SkippedStore>,
    pub report_csv: String,
}

/// Writes `<output_dir>/<job_id>.csv` and `<output_dir>/<job_id>.manifest.json`.
#[derive(Debug, Clone)]
pub struct FsReportSink {
    output_dir: PathBuf,
    config_hash: String,
}

impl FsReportSink {
    pub fn new(output_dir: impl Into<PathBuf>, config_hash: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            config_hash: config_hash.into(),
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn csv_path(&self, job_id: Uuid) -> PathBuf {
        self.output_dir.join(format!("{job_id}.csv"))
    }

    pub fn manifest_path(&self, job_id: Uuid) -> PathBuf {
        self.output_dir.join(format!("{job_id}.manifest.json"))
    }
}

impl ReportSink for FsReportSink {
    fn persist(&self, job_id: Uuid, table: &ReportTable) -> Result<String> {
        fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("create report dir failed: {}", self.output_dir.display())
        })?;

        // Temp name + rename: the final path only ever holds a complete file.
        let csv_path = self.csv_path(job_id);
        let tmp_path = self.output_dir.join(format!("{job_id}.csv.partial"));
        fs::write(&tmp_path, table.to_csv_bytes()?)
            .with_context(|| format!("write report failed: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &csv_path)
            .with_context(|| format!("finalize report failed: {}", csv_path.display()))?;

        let manifest = ReportManifest {
            schema_version: MANIFEST_SCHEMA_VERSION,
            job_id,
            as_of_utc: table.as_of_utc,
            generated_at_utc: Utc::now(),
            config_hash: self.config_hash.clone(),
            rows: table.rows.len(),
            skipped: table.skipped.clone(),
            report_csv: format!("{job_id}.csv"),
        };
        let manifest_path = self.manifest_path(job_id);
        let json = serde_json::to_string_pretty(&manifest).context("serialize manifest failed")?;
        fs::write(&manifest_path, format!("{json}\n"))
            .with_context(|| format!("write manifest failed: {}", manifest_path.display()))?;

        Ok(csv_path.display().to_string())
    }

    fn read(&self, location: &str) -> Result<Vec<u8>> {
        fs::read(location).with_context(|| format!("read report failed: {location}"))
    }
}

// ---------------------------------------------------------------------------
// In-memory sink
// ---------------------------------------------------------------------------

/// Keeps CSV bytes in a map keyed by `mem://<job_id>`.
#[derive(Debug, Default)]
pub struct MemoryReportSink {
    reports: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl MemoryReportSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.reports.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ReportSink for MemoryReportSink {
    fn persist(&self, job_id: Uuid, table: &ReportTable) -> Result<String> {
        let location = format!("mem://{job_id}");
        let bytes = table.to_csv_bytes()?;
        self.reports
            .lock()
            .map_err(|_| anyhow!("report map lock poisoned"))?
            .insert(location.clone(), bytes);
        Ok(location)
    }

    fn read(&self, location: &str) -> Result<Vec<u8>> {
        self.reports
            .lock()
            .map_err(|_| anyhow!("report map lock poisoned"))?
            .get(location)
            .cloned()
            .ok_or_else(|| anyhow!("no report at {location}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn table() -> ReportTable {
        ReportTable {
            as_of_utc: Utc.with_ymd_and_hms(2023, 1, 25, 0, 0, 0).unwrap(),
            rows: Vec::new(),
            skipped: vec![SkippedStore {
                store_id: "x".to_string(),
                reason: "corrupt".to_string(),
            }],
        }
    }

    #[test]
    fn fs_sink_writes_csv_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsReportSink::new(dir.path().join("reports"), "abc123");
        let job_id = Uuid::new_v4();

        let location = sink.persist(job_id, &table()).unwrap();
        assert_eq!(location, sink.csv_path(job_id).display().to_string());

        let bytes = sink.read(&location).unwrap();
        assert!(String::from_utf8(bytes).unwrap().starts_with("store_id,"));

        let manifest: ReportManifest =
            serde_json::from_str(&fs::read_to_string(sink.manifest_path(job_id)).unwrap())
                .unwrap();
        assert_eq!(manifest.job_id, job_id);
        assert_eq!(manifest.config_hash, "abc123");
        assert_eq!(manifest.rows, 0);
        assert_eq!(manifest.skipped.len(), 1);
        assert!(!dir
            .path()
            .join("reports")
            .join(format!("{job_id}.csv.partial"))
            .exists());
    }

    #[test]
    fn fs_sink_read_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let sink = FsReportSink::new(dir.path(), "h");
        assert!(sink.read(&dir.path().join("nope.csv").display().to_string()).is_err());
    }

    #[test]
    fn memory_sink_round_trip() {
        let sink = MemoryReportSink::new();
        let job_id = Uuid::new_v4();
        let loc = sink.persist(job_id, &table()).unwrap();
        assert_eq!(loc, format!("mem://{job_id}"));
        assert_eq!(sink.len(), 1);
        assert!(sink.read(&loc).is_ok());
        assert!(sink.read("mem://other").is_err());
    }
}
