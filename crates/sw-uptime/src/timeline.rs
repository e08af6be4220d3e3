//! One store's status samples over a bounded horizon.

use std::fmt;

use chrono::{DateTime, Utc};
use sw_schemas::{parse_timestamp_utc, RawSample, SampleStatus, StatusSample};
use sw_sources::{SourceError, StatusSampleSource};
use tracing::debug;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimelineError {
    /// The source returned a row belonging to another store.
    ForeignSample { expected: String, found: String },
    /// The sample source failed.
    Source(SourceError),
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelineError::ForeignSample { expected, found } => write!(
                f,
                "timeline for store '{expected}' contains a sample for store '{found}'"
            ),
            TimelineError::Source(e) => write!(f, "timeline load failed: {e}"),
        }
    }
}

impl std::error::Error for TimelineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TimelineError::Source(e) => Some(e),
            TimelineError::ForeignSample { .. } => None,
        }
    }
}

impl From<SourceError> for TimelineError {
    fn from(e: SourceError) -> Self {
        TimelineError::Source(e)
    }
}

// ---------------------------------------------------------------------------
// StatusTimeline
// ---------------------------------------------------------------------------

/// What happened to the raw rows during a load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadStats {
    pub rows_read: usize,
    /// Unparseable timestamp or unknown status.
    pub malformed: usize,
    /// Parsed but outside `[from_utc, to_utc]`.
    pub out_of_range: usize,
    /// Earlier rows replaced by a later row with the same timestamp.
    pub duplicates: usize,
}

/// Samples for one store, ascending by timestamp, unique per timestamp,
/// all within `[from_utc, to_utc]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusTimeline {
    store_id: String,
    from_utc: DateTime<Utc>,
    to_utc: DateTime<Utc>,
    samples: Vec<StatusSample>,
    stats: LoadStats,
}

impl StatusTimeline {
    /// Query `source` and build the timeline.
    pub fn load(
        source: &dyn StatusSampleSource,
        store_id: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<Self, TimelineError> {
        let rows = source.query(store_id, from_utc, to_utc)?;
        Self::from_raw(store_id, rows, from_utc, to_utc)
    }

    /// Build from rows already in hand. Malformed rows are dropped and
    /// counted; a row for a different store fails the whole timeline.
    pub fn from_raw(
        store_id: &str,
        rows: Vec<RawSample>,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<Self, TimelineError> {
        let mut stats = LoadStats {
            rows_read: rows.len(),
            ..LoadStats::default()
        };

        let mut parsed: Vec<StatusSample> = Vec::with_capacity(rows.len());
        for row in rows {
            if row.store_id != store_id {
                return Err(TimelineError::ForeignSample {
                    expected: store_id.to_string(),
                    found: row.store_id,
                });
            }
            let (Some(ts), Some(status)) = (
                parse_timestamp_utc(&row.timestamp_utc),
                SampleStatus::parse(&row.status),
            ) else {
                stats.malformed += 1;
                continue;
            };
            if ts < from_utc || ts > to_utc {
                stats.out_of_range += 1;
                continue;
            }
            parsed.push(StatusSample {
                store_id: row.store_id,
                timestamp_utc: ts,
                status,
            });
        }

        // Stable sort keeps input order among equal timestamps, so the
        // replacement below keeps the last-seen row.
        parsed.sort_by_key(|s| s.timestamp_utc);
        let mut samples: Vec<StatusSample> = Vec::with_capacity(parsed.len());
        for s in parsed {
            match samples.last_mut() {
                Some(last) if last.timestamp_utc == s.timestamp_utc => {
                    *last = s;
                    stats.duplicates += 1;
                }
                _ => samples.push(s),
            }
        }

        if stats.malformed > 0 || stats.duplicates > 0 {
            debug!(
                store_id,
                malformed = stats.malformed,
                duplicates = stats.duplicates,
                kept = samples.len(),
                "timeline cleaned"
            );
        }

        Ok(Self {
            store_id: store_id.to_string(),
            from_utc,
            to_utc,
            samples,
            stats,
        })
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn from_utc(&self) -> DateTime<Utc> {
        self.from_utc
    }

    pub fn to_utc(&self) -> DateTime<Utc> {
        self.to_utc
    }

    pub fn samples(&self) -> &[StatusSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stats(&self) -> LoadStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sw_sources::InMemoryStore;

    fn t(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 24, h, m, 0).unwrap()
    }

    fn raw(ts: &str, status: &str) -> RawSample {
        RawSample::new("s1", ts, status)
    }

    #[test]
    fn sorts_and_keeps_last_duplicate() {
        let rows = vec![
            raw("2023-01-24 12:00:00 UTC", "active"),
            raw("2023-01-24 10:00:00 UTC", "inactive"),
            raw("2023-01-24 12:00:00 UTC", "inactive"),
        ];
        let tl = StatusTimeline::from_raw("s1", rows, t(0, 0), t(23, 0)).unwrap();
        let got: Vec<(DateTime<Utc>, SampleStatus)> = tl
            .samples()
            .iter()
            .map(|s| (s.timestamp_utc, s.status))
            .collect();
        assert_eq!(
            got,
            vec![
                (t(10, 0), SampleStatus::Inactive),
                (t(12, 0), SampleStatus::Inactive)
            ]
        );
        assert_eq!(tl.stats().duplicates, 1);
    }

    #[test]
    fn malformed_rows_dropped_and_counted() {
        let rows = vec![
            raw("2023-01-24 10:00:00 UTC", "active"),
            raw("yesterday", "active"),
            raw("2023-01-24 11:00:00 UTC", "sleeping"),
        ];
        let tl = StatusTimeline::from_raw("s1", rows, t(0, 0), t(23, 0)).unwrap();
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.stats().malformed, 2);
        assert_eq!(tl.stats().rows_read, 3);
    }

    #[test]
    fn range_is_inclusive_and_enforced() {
        let rows = vec![
            raw("2023-01-24 09:59:59 UTC", "active"),
            raw("2023-01-24 10:00:00 UTC", "active"),
            raw("2023-01-24 11:00:00 UTC", "active"),
            raw("2023-01-24 11:00:01 UTC", "active"),
        ];
        let tl = StatusTimeline::from_raw("s1", rows, t(10, 0), t(11, 0)).unwrap();
        assert_eq!(tl.len(), 2);
        assert_eq!(tl.stats().out_of_range, 2);
    }

    #[test]
    fn foreign_sample_fails_load() {
        let rows = vec![raw("2023-01-24 10:00:00 UTC", "active"), RawSample::new(
            "s2",
            "2023-01-24 10:05:00 UTC",
            "active",
        )];
        let err = StatusTimeline::from_raw("s1", rows, t(0, 0), t(23, 0)).unwrap_err();
        assert_eq!(
            err,
            TimelineError::ForeignSample {
                expected: "s1".to_string(),
                found: "s2".to_string()
            }
        );
    }

    #[test]
    fn load_from_source() {
        let mut store = InMemoryStore::new();
        store.push_sample(raw("2023-01-24 10:00:00 UTC", "ACTIVE"));
        store.push_sample(raw("2023-01-24 08:00:00 UTC", "inactive"));
        let tl = StatusTimeline::load(&store, "s1", t(9, 0), t(23, 0)).unwrap();
        assert_eq!(tl.len(), 1);
        assert_eq!(tl.samples()[0].status, SampleStatus::Active);
        assert_eq!(tl.store_id(), "s1");
    }

    #[test]
    fn source_error_propagates() {
        struct Down;
        impl StatusSampleSource for Down {
            fn query(
                &self,
                _: &str,
                _: DateTime<Utc>,
                _: DateTime<Utc>,
            ) -> Result<Vec<RawSample>, SourceError> {
                Err(SourceError::Transport("db down".to_string()))
            }
        }
        let err = StatusTimeline::load(&Down, "s1", t(0, 0), t(1, 0)).unwrap_err();
        assert!(matches!(err, TimelineError::Source(SourceError::Transport(_))));
        assert!(err.to_string().contains("db down"));
    }
}
