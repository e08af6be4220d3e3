//! In-memory implementation of every source trait.
//!
//! Used by tests, by the offline CLI path (`sw report --data-dir`), and as the
//! per-job snapshot materialized from Postgres by `sw-db`.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use sw_schemas::{parse_timestamp_utc, RawBusinessHours, RawSample};

use crate::source::{
    BusinessHoursSource, SourceError, StatusSampleSource, StoreRegistry, TimezoneSource,
};

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    samples: BTreeMap<String, Vec<RawSample>>,
    hours: BTreeMap<String, Vec<RawBusinessHours>>,
    timezones: BTreeMap<String, String>,
    registered: BTreeSet<String>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_sample(&mut self, sample: RawSample) {
        self.samples
            .entry(sample.store_id.clone())
            .or_default()
            .push(sample);
    }

    pub fn push_hours(&mut self, row: RawBusinessHours) {
        self.hours.entry(row.store_id.clone()).or_default().push(row);
    }

    /// Later calls for the same store overwrite (at most one zone per store).
    pub fn set_timezone(&mut self, store_id: impl Into<String>, zone_id: impl Into<String>) {
        self.timezones.insert(store_id.into(), zone_id.into());
    }

    /// Register a store that should be reported even with no samples.
    pub fn register_store(&mut self, store_id: impl Into<String>) {
        self.registered.insert(store_id.into());
    }

    pub fn sample_count(&self) -> usize {
        self.samples.values().map(Vec::len).sum()
    }
}

impl StatusSampleSource for InMemoryStore {
    fn query(
        &self,
        store_id: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, SourceError> {
        let Some(rows) = self.samples.get(store_id) else {
            return Ok(Vec::new());
        };
        // Unparseable rows pass through so the timeline can count them.
        Ok(rows
            .iter()
            .filter(|r| match parse_timestamp_utc(&r.timestamp_utc) {
                Some(ts) => ts >= from_utc && ts <= to_utc,
                None => true,
            })
            .cloned()
            .collect())
    }

    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, SourceError> {
        Ok(self
            .samples
            .values()
            .flatten()
            .filter_map(|r| parse_timestamp_utc(&r.timestamp_utc))
            .max())
    }
}

impl BusinessHoursSource for InMemoryStore {
    fn query(&self, store_id: &str) -> Result<Vec<RawBusinessHours>, SourceError> {
        Ok(self.hours.get(store_id).cloned().unwrap_or_default())
    }
}

impl TimezoneSource for InMemoryStore {
    fn query(&self, store_id: &str) -> Result<Option<String>, SourceError> {
        Ok(self.timezones.get(store_id).cloned())
    }
}

impl StoreRegistry for InMemoryStore {
    /// Every store with at least one sample, plus explicitly registered ones.
    fn list_ids(&self) -> Result<BTreeSet<String>, SourceError> {
        let mut ids = self.registered.clone();
        ids.extend(self.samples.keys().cloned());
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 24, h, m, 0).unwrap()
    }

    fn store() -> InMemoryStore {
        let mut s = InMemoryStore::new();
        s.push_sample(RawSample::new("a", "2023-01-24 09:00:00 UTC", "active"));
        s.push_sample(RawSample::new("a", "2023-01-24 11:00:00 UTC", "inactive"));
        s.push_sample(RawSample::new("a", "garbage", "active"));
        s.push_sample(RawSample::new("b", "2023-01-24 10:00:00 UTC", "active"));
        s
    }

    #[test]
    fn query_filters_by_store_and_range_passing_unparseable_rows() {
        let s = store();
        let rows = StatusSampleSource::query(&s, "a", utc(8, 0), utc(10, 0)).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp_utc, "2023-01-24 09:00:00 UTC");
        assert_eq!(rows[1].timestamp_utc, "garbage");
    }

    #[test]
    fn unknown_store_yields_empty() {
        let s = store();
        assert!(StatusSampleSource::query(&s, "zzz", utc(0, 0), utc(23, 0))
            .unwrap()
            .is_empty());
        assert!(BusinessHoursSource::query(&s, "zzz").unwrap().is_empty());
        assert_eq!(TimezoneSource::query(&s, "zzz").unwrap(), None);
    }

    #[test]
    fn latest_timestamp_ignores_garbage() {
        assert_eq!(store().latest_timestamp().unwrap(), Some(utc(11, 0)));
        assert_eq!(InMemoryStore::new().latest_timestamp().unwrap(), None);
    }

    #[test]
    fn list_ids_unions_samples_and_registered() {
        let mut s = store();
        s.register_store("c");
        let ids: Vec<String> = s.list_ids().unwrap().into_iter().collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn set_timezone_overwrites() {
        let mut s = InMemoryStore::new();
        s.set_timezone("a", "America/Chicago");
        s.set_timezone("a", "Asia/Kolkata");
        assert_eq!(
            TimezoneSource::query(&s, "a").unwrap().as_deref(),
            Some("Asia/Kolkata")
        );
    }
}
