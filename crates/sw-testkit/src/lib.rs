//! Fixture builders shared by StoreWatch scenario tests.
//!
//! A [`Fixture`] is a set of raw rows. It can be materialized as an
//! [`InMemoryStore`] or written out as a CSV data directory in the same
//! layout `sw ingest` and `sw report --data-dir` read.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use sw_jobs::ReportService;
use sw_report::{MemoryReportSink, ReportAssembler, ReportSink};
use sw_schemas::{AsOfPolicy, RawBusinessHours, RawSample, ReportRow, StoreTimezone};
use sw_sources::ingest_csv::{MENU_HOURS_FILE, STORE_STATUS_FILE, TIMEZONES_FILE};
use sw_sources::{InMemoryStore, Sources};

/// Timestamp text in the form the source data uses.
pub fn ts_text(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%d %H:%M:%S%.f UTC").to_string()
}

#[derive(Debug, Clone, Default)]
pub struct Fixture {
    pub samples: Vec<RawSample>,
    pub hours: Vec<RawBusinessHours>,
    pub timezones: Vec<StoreTimezone>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sample(mut self, store_id: &str, ts: DateTime<Utc>, status: &str) -> Self {
        self.samples.push(RawSample::new(store_id, ts_text(ts), status));
        self
    }

    /// One sample every `step` in `[from, to)`, status chosen by `status_at`.
    pub fn polled(
        mut self,
        store_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        step: TimeDelta,
        status_at: impl Fn(DateTime<Utc>) -> &'static str,
    ) -> Self {
        let mut t = from;
        while t < to {
            self.samples.push(RawSample::new(store_id, ts_text(t), status_at(t)));
            t += step;
        }
        self
    }

    /// `day` is 0 = Monday .. 6 = Sunday.
    pub fn hours(mut self, store_id: &str, day: u8, start: &str, end: &str) -> Self {
        self.hours
            .push(RawBusinessHours::new(store_id, day.to_string(), start, end));
        self
    }

    /// Same hours every day of the week.
    pub fn daily_hours(self, store_id: &str, start: &str, end: &str) -> Self {
        (0..7).fold(self, |f, day| f.hours(store_id, day, start, end))
    }

    pub fn timezone(mut self, store_id: &str, zone: &str) -> Self {
        self.timezones.push(StoreTimezone {
            store_id: store_id.to_string(),
            zone_id: zone.to_string(),
        });
        self
    }

    pub fn to_store(&self) -> InMemoryStore {
        let mut store = InMemoryStore::new();
        for s in &self.samples {
            store.push_sample(s.clone());
        }
        for h in &self.hours {
            store.push_hours(h.clone());
        }
        for tz in &self.timezones {
            store.set_timezone(tz.store_id.clone(), tz.zone_id.clone());
        }
        store
    }

    /// Write the three CSV files under `dir`.
    pub fn write_csv_dir(&self, dir: &Path) -> Result<()> {
        write_csv(
            &dir.join(STORE_STATUS_FILE),
            &["store_id", "status", "timestamp_utc"],
            self.samples
                .iter()
                .map(|s| vec![s.store_id.as_str(), s.status.as_str(), s.timestamp_utc.as_str()]),
        )?;
        write_csv(
            &dir.join(MENU_HOURS_FILE),
            &["store_id", "dayOfWeek", "start_time_local", "end_time_local"],
            self.hours.iter().map(|h| {
                vec![
                    h.store_id.as_str(),
                    h.day_of_week.as_str(),
                    h.start_time_local.as_str(),
                    h.end_time_local.as_str(),
                ]
            }),
        )?;
        write_csv(
            &dir.join(TIMEZONES_FILE),
            &["store_id", "timezone_str"],
            self.timezones
                .iter()
                .map(|t| vec![t.store_id.as_str(), t.zone_id.as_str()]),
        )?;
        Ok(())
    }
}

fn write_csv<'a>(
    path: &Path,
    header: &[&str],
    rows: impl Iterator<Item = Vec<&'a str>>,
) -> Result<()> {
    let mut w = csv::Writer::from_path(path)
        .with_context(|| format!("create csv: {}", path.display()))?;
    w.write_record(header)?;
    for row in rows {
        w.write_record(&row)?;
    }
    w.flush()
        .with_context(|| format!("flush csv: {}", path.display()))?;
    Ok(())
}

/// Service over `store` with an in-memory sink.
pub fn memory_service(store: InMemoryStore, fallback_tz: Tz, workers: usize) -> ReportService {
    service_with_sink(store, fallback_tz, workers, Arc::new(MemoryReportSink::new()))
}

pub fn service_with_sink(
    store: InMemoryStore,
    fallback_tz: Tz,
    workers: usize,
    sink: Arc<dyn ReportSink>,
) -> ReportService {
    let assembler = ReportAssembler::new(Sources::from_shared(Arc::new(store)), fallback_tz, workers);
    ReportService::new(assembler, sink, AsOfPolicy::WallClock)
}

/// Parse report CSV bytes into rows keyed by store id.
pub fn parse_report_csv(bytes: &[u8]) -> Result<BTreeMap<String, ReportRow>> {
    let mut rdr = csv::Reader::from_reader(bytes);
    let mut out = BTreeMap::new();
    for rec in rdr.deserialize::<ReportRow>() {
        let row = rec.context("parse report row")?;
        out.insert(row.store_id.clone(), row);
    }
    Ok(out)
}

/// Temp directory that lives as long as the returned guard.
pub fn temp_dir() -> Result<tempfile::TempDir> {
    tempfile::tempdir().context("create temp dir")
}
