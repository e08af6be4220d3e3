//! Weekly business-hours calendar.
//!
//! # Design
//!
//! A store's configuration is parsed once into a [`WeeklySchedule`]: seven
//! ordered, non-overlapping lists of [`LocalInterval`]s. Every query after
//! that is pure, so the estimator can clip thousands of intervals without
//! going back to the source.
//!
//! # Defaulting
//!
//! - No usable rows at all: open 24 hours every day.
//! - Some weekdays configured: the others are closed.
//! - Overnight rows (start > end) split at midnight into the next weekday.
//! - Overlapping rows on one weekday merge.
//! - Rows with a bad weekday or time are dropped individually.

use std::sync::Arc;

use chrono::{Datelike, NaiveDateTime, NaiveTime, Timelike, Weekday};
use sw_schemas::RawBusinessHours;
use sw_sources::{BusinessHoursSource, SourceError};
use tracing::{debug, warn};

/// Seconds in a civil day; also the representation of local `24:00`.
pub const SECS_PER_DAY: u32 = 86_400;

// ---------------------------------------------------------------------------
// LocalInterval
// ---------------------------------------------------------------------------

/// An open period within one local day, as seconds since local midnight.
///
/// Invariant: `start_secs <= end_secs <= SECS_PER_DAY`. Both ends are
/// inclusive for membership tests.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct LocalInterval {
    start_secs: u32,
    end_secs: u32,
}

impl LocalInterval {
    /// Returns `None` when the bounds violate the invariant.
    pub fn new(start_secs: u32, end_secs: u32) -> Option<Self> {
        (start_secs <= end_secs && end_secs <= SECS_PER_DAY).then_some(Self {
            start_secs,
            end_secs,
        })
    }

    pub fn full_day() -> Self {
        Self {
            start_secs: 0,
            end_secs: SECS_PER_DAY,
        }
    }

    pub fn start_secs(&self) -> u32 {
        self.start_secs
    }

    pub fn end_secs(&self) -> u32 {
        self.end_secs
    }

    pub fn duration_secs(&self) -> u32 {
        self.end_secs - self.start_secs
    }

    /// Inclusive on both ends. `nanos` breaks ties at the closing second so
    /// 17:00:00.5 is outside an interval closing at 17:00:00.
    fn contains(&self, secs: u32, nanos: u32) -> bool {
        secs >= self.start_secs
            && (secs < self.end_secs || (secs == self.end_secs && nanos == 0))
    }
}

// ---------------------------------------------------------------------------
// WeeklySchedule
// ---------------------------------------------------------------------------

/// One store's normalized weekly hours. Index 0 = Monday.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WeeklySchedule {
    days: [Vec<LocalInterval>; 7],
    always_open: bool,
}

impl WeeklySchedule {
    /// 24 × 7: the default for stores with no configuration.
    pub fn always_open() -> Self {
        Self {
            days: std::array::from_fn(|_| vec![LocalInterval::full_day()]),
            always_open: true,
        }
    }

    /// Build from `(weekday, start_secs, end_secs)` triples. `start > end`
    /// means an overnight shift and spills into the following weekday.
    ///
    /// An empty input yields [`WeeklySchedule::always_open`].
    pub fn from_triples<I>(triples: I) -> Self
    where
        I: IntoIterator<Item = (u8, u32, u32)>,
    {
        let mut days: [Vec<LocalInterval>; 7] = Default::default();
        let mut any = false;

        for (day, start, end) in triples {
            let day = usize::from(day % 7);
            any = true;
            if start <= end {
                days[day].push(LocalInterval {
                    start_secs: start,
                    end_secs: end,
                });
            } else {
                days[day].push(LocalInterval {
                    start_secs: start,
                    end_secs: SECS_PER_DAY,
                });
                days[(day + 1) % 7].push(LocalInterval {
                    start_secs: 0,
                    end_secs: end,
                });
            }
        }

        if !any {
            return Self::always_open();
        }

        for list in days.iter_mut() {
            merge_overlapping(list);
        }

        Self {
            days,
            always_open: false,
        }
    }

    /// Parse raw rows, dropping malformed ones individually.
    pub fn from_raw(store_id: &str, rows: &[RawBusinessHours]) -> Self {
        let mut dropped = 0usize;
        let triples: Vec<(u8, u32, u32)> = rows
            .iter()
            .filter_map(|r| {
                let parsed = (
                    parse_weekday_index(&r.day_of_week),
                    parse_local_time(&r.start_time_local),
                    parse_local_time(&r.end_time_local),
                );
                match parsed {
                    (Some(d), Some(s), Some(e)) => Some((d, s, e)),
                    _ => {
                        dropped += 1;
                        None
                    }
                }
            })
            .collect();

        if dropped > 0 {
            warn!(store_id, dropped, "dropped malformed business-hours rows");
        }
        if triples.is_empty() && !rows.is_empty() {
            debug!(store_id, "no usable business-hours rows; treating as always open");
        }
        Self::from_triples(triples)
    }

    pub fn is_always_open(&self) -> bool {
        self.always_open
    }

    /// Ordered, non-overlapping intervals for `weekday`. Empty means closed.
    pub fn intervals_for(&self, weekday: Weekday) -> &[LocalInterval] {
        &self.days[weekday.num_days_from_monday() as usize]
    }

    /// True iff the time-of-day lies in any interval of that weekday
    /// (inclusive boundaries).
    pub fn is_open(&self, local: NaiveDateTime) -> bool {
        let secs = local.time().num_seconds_from_midnight();
        let nanos = local.time().nanosecond();
        self.intervals_for(local.weekday())
            .iter()
            .any(|iv| iv.contains(secs, nanos))
    }

    /// Nominal open seconds per week (ignores DST).
    pub fn weekly_open_secs(&self) -> u64 {
        self.days
            .iter()
            .flatten()
            .map(|iv| u64::from(iv.duration_secs()))
            .sum()
    }
}

fn merge_overlapping(list: &mut Vec<LocalInterval>) {
    list.sort();
    let mut merged: Vec<LocalInterval> = Vec::with_capacity(list.len());
    for iv in list.drain(..) {
        match merged.last_mut() {
            Some(last) if iv.start_secs <= last.end_secs => {
                last.end_secs = last.end_secs.max(iv.end_secs);
            }
            _ => merged.push(iv),
        }
    }
    *list = merged;
}

// ---------------------------------------------------------------------------
// BusinessHoursCalendar
// ---------------------------------------------------------------------------

/// Source-backed calendar answering per-store queries.
#[derive(Clone)]
pub struct BusinessHoursCalendar {
    source: Arc<dyn BusinessHoursSource>,
}

impl BusinessHoursCalendar {
    pub fn new(source: Arc<dyn BusinessHoursSource>) -> Self {
        Self { source }
    }

    /// Fetch and normalize one store's hours.
    pub fn schedule_for(&self, store_id: &str) -> Result<WeeklySchedule, SourceError> {
        let rows = self.source.query(store_id)?;
        Ok(WeeklySchedule::from_raw(store_id, &rows))
    }

    pub fn intervals_for(
        &self,
        store_id: &str,
        weekday: Weekday,
    ) -> Result<Vec<LocalInterval>, SourceError> {
        Ok(self.schedule_for(store_id)?.intervals_for(weekday).to_vec())
    }

    pub fn is_open(&self, store_id: &str, local: NaiveDateTime) -> Result<bool, SourceError> {
        Ok(self.schedule_for(store_id)?.is_open(local))
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// `"0"`..`"6"`, 0 = Monday.
pub fn parse_weekday_index(s: &str) -> Option<u8> {
    match s.trim().parse::<u8>() {
        Ok(d) if d <= 6 => Some(d),
        _ => None,
    }
}

/// Local time-of-day as seconds since midnight. Accepts `HH:MM:SS[.frac]`,
/// `HH:MM`, and `24:00[:00]` (end of day). Fractions are truncated.
pub fn parse_local_time(s: &str) -> Option<u32> {
    let s = s.trim();
    if s == "24:00" || s == "24:00:00" {
        return Some(SECS_PER_DAY);
    }
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
        .map(|t| t.num_seconds_from_midnight())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
