use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sw_schemas::{ReportRow, StoreReport, REPORT_COLUMNS};

/// A store left out of a report, and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedStore {
    pub store_id: String,
    pub reason: String,
}

/// What happened to one store during assembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOutcome {
    Reported(StoreReport),
    Skipped(SkippedStore),
}

impl StoreOutcome {
    pub fn store_id(&self) -> &str {
        match self {
            StoreOutcome::Reported(r) => &r.store_id,
            StoreOutcome::Skipped(s) => &s.store_id,
        }
    }
}

/// A finished report: one row per reported store, ordered by store id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportTable {
    pub as_of_utc: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    pub skipped: Vec<SkippedStore>,
}

impl ReportTable {
    /// Fan-in outcomes in any order; rows and skips come out sorted.
    pub fn from_outcomes(as_of_utc: DateTime<Utc>, outcomes: Vec<StoreOutcome>) -> Self {
        let mut rows = Vec::new();
        let mut skipped = Vec::new();
        for o in outcomes {
            match o {
                StoreOutcome::Reported(r) => rows.push(r.to_row()),
                StoreOutcome::Skipped(s) => skipped.push(s),
            }
        }
        rows.sort_by(|a, b| a.store_id.cmp(&b.store_id));
        skipped.sort_by(|a, b| a.store_id.cmp(&b.store_id));
        Self {
            as_of_utc,
            rows,
            skipped,
        }
    }

    /// Header row plus one line per store, in the fixed column order.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>> {
        let mut w = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(Vec::new());
        w.write_record(REPORT_COLUMNS)
            .context("write report header failed")?;
        for row in &self.rows {
            w.serialize(row)
                .with_context(|| format!("write report row failed: store_id={}", row.store_id))?;
        }
        w.into_inner()
            .map_err(|e| anyhow!("flush report csv failed: {}", e.error()))
    }
}
