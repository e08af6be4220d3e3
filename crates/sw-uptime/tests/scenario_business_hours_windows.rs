//! Window estimation against configured business hours and zones.
//!
//! Reference dates (America/Chicago, CST = UTC-6 in January):
//!   2023-01-23 Mon
//!   2023-01-22 Sun
//!   2023-03-12 Sun  spring-forward (02:00 → 03:00)

use std::sync::Arc;

use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use sw_calendar::DEFAULT_FALLBACK_TZ;
use sw_schemas::{RawBusinessHours, RawSample, WindowKind};
use sw_sources::{InMemoryStore, Sources};
use sw_uptime::UptimeEstimator;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

fn sample(store: &str, ts: DateTime<Utc>, status: &str) -> RawSample {
    RawSample::new(store, ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(), status)
}

fn estimator(store: InMemoryStore) -> UptimeEstimator {
    UptimeEstimator::new(&Sources::from_shared(Arc::new(store)), DEFAULT_FALLBACK_TZ)
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn monday_nine_to_five_day_window() {
    let mut store = InMemoryStore::new();
    store.set_timezone("s1", "America/Chicago");
    store.push_hours(RawBusinessHours::new("s1", "0", "09:00:00", "17:00:00"));
    // 09:00, 12:00, 15:00 CST.
    store.push_sample(sample("s1", utc(2023, 1, 23, 15, 0), "active"));
    store.push_sample(sample("s1", utc(2023, 1, 23, 18, 0), "inactive"));
    store.push_sample(sample("s1", utc(2023, 1, 23, 21, 0), "active"));

    // As of Monday 17:00 CST.
    let r = estimator(store)
        .estimate_store("s1", utc(2023, 1, 23, 23, 0))
        .unwrap();

    assert_eq!(r.last_day.uptime_minutes, 300);
    assert_eq!(r.last_day.downtime_minutes, 180);
    assert_eq!(r.last_hour.uptime_minutes, 60);
    assert_eq!(r.last_hour.downtime_minutes, 0);
    // Only Monday is configured, so the week holds one business day.
    assert_eq!(r.last_week.uptime_minutes, 300);
    assert_eq!(r.last_week.downtime_minutes, 180);
}

#[test]
fn unconfigured_store_last_hour() {
    let now = utc(2023, 1, 24, 10, 0);
    let mut store = InMemoryStore::new();
    store.push_sample(sample("s1", now - TimeDelta::minutes(30), "active"));

    let r = estimator(store).estimate_store("s1", now).unwrap();
    assert_eq!(r.last_hour.uptime_minutes, 30);
    assert_eq!(r.last_hour.downtime_minutes, 30);
    assert_eq!(r.last_day.uptime_minutes, 30);
    assert_eq!(r.last_day.downtime_minutes, 1_410);
}

#[test]
fn store_without_samples_is_down_for_all_business_minutes() {
    let mut store = InMemoryStore::new();
    store.register_store("quiet");
    store.set_timezone("quiet", "America/Chicago");
    store.push_hours(RawBusinessHours::new("quiet", "1", "10:00", "14:00"));

    let now = utc(2023, 1, 25, 6, 0); // Wed 00:00 CST
    let est = estimator(store);
    let r = est.estimate_store("quiet", now).unwrap();
    assert_eq!(r.last_day.uptime_minutes, 0);
    assert_eq!(r.last_day.downtime_minutes, 240);
    assert_eq!(
        est.business_minutes("quiet", WindowKind::Day, now).unwrap(),
        240
    );
}

#[test]
fn sample_at_closing_time_is_within_hours() {
    let mut store = InMemoryStore::new();
    store.set_timezone("s1", "America/Chicago");
    store.push_hours(RawBusinessHours::new("s1", "0", "09:00:00", "17:00:00"));
    store.push_sample(sample("s1", utc(2023, 1, 23, 15, 0), "active"));
    // Exactly 17:00 CST.
    store.push_sample(sample("s1", utc(2023, 1, 23, 23, 0), "inactive"));

    let schedule = sw_calendar::WeeklySchedule::from_raw(
        "s1",
        &[RawBusinessHours::new("s1", "0", "09:00:00", "17:00:00")],
    );
    let local_close = utc(2023, 1, 23, 23, 0)
        .with_timezone(&chrono_tz::America::Chicago)
        .naive_local();
    assert!(schedule.is_open(local_close));

    let r = estimator(store)
        .estimate_store("s1", utc(2023, 1, 24, 6, 0))
        .unwrap();
    assert_eq!(r.last_day.uptime_minutes, 480);
    assert_eq!(r.last_day.downtime_minutes, 0);
}

#[test]
fn always_open_day_across_spring_forward() {
    let now = utc(2023, 3, 12, 18, 0); // 13:00 CDT
    let mut store = InMemoryStore::new();
    store.set_timezone("s1", "America/Chicago");
    store.push_sample(sample("s1", now - TimeDelta::days(1), "active"));

    let r = estimator(store).estimate_store("s1", now).unwrap();
    assert_eq!(r.last_day.uptime_minutes, 1_440);
    assert_eq!(r.last_day.downtime_minutes, 0);
}

#[test]
fn overnight_hours_count_across_midnight() {
    let mut store = InMemoryStore::new();
    store.set_timezone("bar", "America/Chicago");
    store.push_hours(RawBusinessHours::new("bar", "6", "22:00:00", "02:00:00"));
    // Sun 21:00 CST active, Mon 01:00 CST inactive.
    store.push_sample(sample("bar", utc(2023, 1, 23, 3, 0), "active"));
    store.push_sample(sample("bar", utc(2023, 1, 23, 7, 0), "inactive"));

    // Mon 06:00 CST.
    let r = estimator(store)
        .estimate_store("bar", utc(2023, 1, 23, 12, 0))
        .unwrap();
    assert_eq!(r.last_day.uptime_minutes, 180);
    assert_eq!(r.last_day.downtime_minutes, 60);
}

#[test]
fn invalid_zone_falls_back_without_error() {
    let mut store = InMemoryStore::new();
    store.set_timezone("s1", "Not/AZone");
    store.push_hours(RawBusinessHours::new("s1", "0", "09:00:00", "17:00:00"));
    store.push_sample(sample("s1", utc(2023, 1, 23, 15, 0), "active"));

    // Fallback is America/Chicago, so this matches the configured case.
    let r = estimator(store)
        .estimate_store("s1", utc(2023, 1, 23, 23, 0))
        .unwrap();
    assert_eq!(r.last_day.uptime_minutes, 480);
}
