//! Business-hours measure of a UTC interval.
//!
//! `[a, b]` is cut at the store's local midnights into [`DaySegment`]s. Each
//! segment is intersected with that local day's open intervals, converted to
//! UTC for that date alone. Because the conversion is per day, 23 h and 25 h
//! DST days are measured as they actually elapsed.
//!
//! The measure is additive: for `a <= m <= b`,
//! `business_duration(a, b) == business_duration(a, m) + business_duration(m, b)`.
//! The estimator's partition guarantee rests on that.

use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use chrono_tz::Tz;
use sw_calendar::{local_midnight_utc, local_to_utc, Bias, WeeklySchedule};

/// The part of a UTC interval that falls on one local calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaySegment {
    pub date: NaiveDate,
    pub start_utc: DateTime<Utc>,
    pub end_utc: DateTime<Utc>,
}

/// Split `[a, b]` at local midnights in `tz`. Empty when `b <= a`.
pub fn local_day_segments(tz: Tz, a: DateTime<Utc>, b: DateTime<Utc>) -> Vec<DaySegment> {
    if b <= a {
        return Vec::new();
    }
    let first = a.with_timezone(&tz).date_naive();
    let last = b.with_timezone(&tz).date_naive();

    let mut out = Vec::new();
    let mut date = first;
    while date <= last {
        let Some(next) = date.succ_opt() else { break };
        let day_start = local_midnight_utc(tz, date);
        let day_end = local_midnight_utc(tz, next);
        let start_utc = a.max(day_start);
        let end_utc = b.min(day_end);
        if start_utc < end_utc {
            out.push(DaySegment {
                date,
                start_utc,
                end_utc,
            });
        }
        date = next;
    }
    out
}

/// UTC open periods of one local date, merged so none overlap.
fn open_periods_utc(
    tz: Tz,
    schedule: &WeeklySchedule,
    date: NaiveDate,
) -> Vec<(DateTime<Utc>, DateTime<Utc>)> {
    let mut periods: Vec<(DateTime<Utc>, DateTime<Utc>)> = schedule
        .intervals_for(date.weekday())
        .iter()
        .map(|iv| {
            (
                local_to_utc(tz, date, iv.start_secs(), Bias::Earliest),
                local_to_utc(tz, date, iv.end_secs(), Bias::Latest),
            )
        })
        .filter(|(open, close)| open < close)
        .collect();

    // Local intervals are disjoint, but a fall-back hour can fold two of
    // them onto the same UTC instants.
    periods.sort();
    let mut merged: Vec<(DateTime<Utc>, DateTime<Utc>)> = Vec::with_capacity(periods.len());
    for (open, close) in periods {
        match merged.last_mut() {
            Some(last) if open <= last.1 => last.1 = last.1.max(close),
            _ => merged.push((open, close)),
        }
    }
    merged
}

/// Elapsed business time inside `[a, b]`.
pub fn business_duration(
    tz: Tz,
    schedule: &WeeklySchedule,
    a: DateTime<Utc>,
    b: DateTime<Utc>,
) -> TimeDelta {
    let mut total = TimeDelta::zero();
    for seg in local_day_segments(tz, a, b) {
        for (open, close) in open_periods_utc(tz, schedule, seg.date) {
            let lo = seg.start_utc.max(open);
            let hi = seg.end_utc.min(close);
            if lo < hi {
                total += hi - lo;
            }
        }
    }
    total
}

/// Whole business minutes inside `[a, b]`, truncated.
pub fn business_minutes(
    tz: Tz,
    schedule: &WeeklySchedule,
    a: DateTime<Utc>,
    b: DateTime<Utc>,
) -> i64 {
    business_duration(tz, schedule, a, b).num_milliseconds() / 60_000
}
