//! Single-sweep uptime/downtime estimation.
//!
//! # Model
//!
//! Status is piecewise constant: after a sample it holds until the next
//! sample or until `now`. Before the first sample seen inside a window the
//! status is unknown and counts as down.
//!
//! # Sweep
//!
//! Every window keeps its own cursor `(last_ts, last_status)` starting at
//! `(window_start, unknown)`. The timeline is walked once. A sample advances
//! each window whose range contains it, charging the business time between
//! the cursor and the sample to the cursor's status. Each window is closed
//! at `now`.
//!
//! Samples older than a window's start never touch that window, so older
//! history cannot leak into a narrower window.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use sw_calendar::{BusinessHoursCalendar, TimeZoneResolver, WeeklySchedule};
use sw_schemas::{SampleStatus, StoreReport, WindowKind, WindowResult};
use sw_sources::{SourceError, Sources, StatusSampleSource};

use crate::decompose::business_duration;
use crate::timeline::{StatusTimeline, TimelineError};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Why one store could not be estimated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EstimateError {
    Timeline(TimelineError),
    Calendar(SourceError),
}

impl fmt::Display for EstimateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EstimateError::Timeline(e) => write!(f, "{e}"),
            EstimateError::Calendar(e) => write!(f, "business hours unavailable: {e}"),
        }
    }
}

impl std::error::Error for EstimateError {}

impl From<TimelineError> for EstimateError {
    fn from(e: TimelineError) -> Self {
        EstimateError::Timeline(e)
    }
}

// ---------------------------------------------------------------------------
// Pure core
// ---------------------------------------------------------------------------

/// Accumulated business time for one window, before minute conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowTally {
    pub window: WindowKind,
    pub start_utc: DateTime<Utc>,
    pub up: TimeDelta,
    pub down: TimeDelta,
}

impl WindowTally {
    /// Truncate to whole minutes without breaking the partition: the total
    /// is truncated once and downtime takes the remainder.
    pub fn to_minutes(&self) -> (i64, i64) {
        let total = (self.up + self.down).num_milliseconds() / 60_000;
        let up = self.up.num_milliseconds() / 60_000;
        (up, total - up)
    }
}

struct Cursor {
    tally: WindowTally,
    last_ts: DateTime<Utc>,
    last_status: Option<SampleStatus>,
}

impl Cursor {
    fn charge(&mut self, tz: Tz, schedule: &WeeklySchedule, until: DateTime<Utc>) {
        let d = business_duration(tz, schedule, self.last_ts, until);
        match self.last_status {
            Some(SampleStatus::Active) => self.tally.up += d,
            Some(SampleStatus::Inactive) | None => self.tally.down += d,
        }
    }
}

/// Run the sweep and return raw per-window tallies, narrowest first.
pub fn sweep(
    timeline: &StatusTimeline,
    tz: Tz,
    schedule: &WeeklySchedule,
    now: DateTime<Utc>,
) -> [WindowTally; 3] {
    let mut cursors = WindowKind::ALL.map(|window| {
        let start_utc = now - window.duration();
        Cursor {
            tally: WindowTally {
                window,
                start_utc,
                up: TimeDelta::zero(),
                down: TimeDelta::zero(),
            },
            last_ts: start_utc,
            last_status: None,
        }
    });

    for sample in timeline.samples() {
        let t = sample.timestamp_utc;
        if t > now {
            break;
        }
        for c in cursors.iter_mut() {
            if t < c.tally.start_utc {
                continue;
            }
            c.charge(tz, schedule, t);
            c.last_ts = t;
            c.last_status = Some(sample.status);
        }
    }

    for c in cursors.iter_mut() {
        c.charge(tz, schedule, now);
    }

    cursors.map(|c| c.tally)
}

/// Estimate all three windows for the timeline's store.
pub fn estimate_windows(
    timeline: &StatusTimeline,
    tz: Tz,
    schedule: &WeeklySchedule,
    now: DateTime<Utc>,
) -> StoreReport {
    let store_id = timeline.store_id();
    let [hour, day, week] = sweep(timeline, tz, schedule, now).map(|tally| {
        let (uptime_minutes, downtime_minutes) = tally.to_minutes();
        WindowResult {
            store_id: store_id.to_string(),
            window: tally.window,
            uptime_minutes,
            downtime_minutes,
        }
    });
    StoreReport {
        store_id: store_id.to_string(),
        last_hour: hour,
        last_day: day,
        last_week: week,
    }
}

// ---------------------------------------------------------------------------
// Source-backed estimator
// ---------------------------------------------------------------------------

/// Loads a store's inputs from the collaborators and runs the sweep.
///
/// Stateless between calls; safe to share across worker threads.
#[derive(Clone)]
pub struct UptimeEstimator {
    samples: Arc<dyn StatusSampleSource>,
    calendar: BusinessHoursCalendar,
    resolver: TimeZoneResolver,
}

impl UptimeEstimator {
    pub fn new(sources: &Sources, fallback_tz: Tz) -> Self {
        Self {
            samples: sources.samples.clone(),
            calendar: BusinessHoursCalendar::new(sources.hours.clone()),
            resolver: TimeZoneResolver::new(sources.timezones.clone(), fallback_tz),
        }
    }

    pub fn fallback_tz(&self) -> Tz {
        self.resolver.fallback()
    }

    /// Lookback horizon needed to cover every window ending at `now`.
    pub fn horizon(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (now - WindowKind::widest().duration(), now)
    }

    pub fn estimate_store(
        &self,
        store_id: &str,
        now: DateTime<Utc>,
    ) -> Result<StoreReport, EstimateError> {
        let (from, to) = Self::horizon(now);
        let timeline = StatusTimeline::load(self.samples.as_ref(), store_id, from, to)?;
        let tz = self.resolver.resolve(store_id);
        let schedule = self
            .calendar
            .schedule_for(store_id)
            .map_err(EstimateError::Calendar)?;
        Ok(estimate_windows(&timeline, tz, &schedule, now))
    }

    /// Business minutes of `window` ending at `now`, for auditing results.
    pub fn business_minutes(
        &self,
        store_id: &str,
        window: WindowKind,
        now: DateTime<Utc>,
    ) -> Result<i64, EstimateError> {
        let tz = self.resolver.resolve(store_id);
        let schedule = self
            .calendar
            .schedule_for(store_id)
            .map_err(EstimateError::Calendar)?;
        Ok(crate::decompose::business_minutes(
            tz,
            &schedule,
            now - window.duration(),
            now,
        ))
    }
}
