//! Store-local time for StoreWatch.
//!
//! Three concerns, one per module:
//!
//! - [`timezone`]: which IANA zone a store lives in (with fallback).
//! - [`hours`]: which local times-of-day a store is open, per weekday.
//! - [`local`]: DST-safe conversion of local wall-clock points to UTC.
//!
//! Nothing here reads status samples or produces minutes; that is
//! `sw-uptime`'s job.

pub mod hours;
pub mod local;
pub mod timezone;

pub use hours::{
    parse_local_time, parse_weekday_index, BusinessHoursCalendar, LocalInterval, WeeklySchedule,
    SECS_PER_DAY,
};
pub use local::{local_midnight_utc, local_to_utc, naive_local_to_utc, Bias};
pub use timezone::{parse_zone, TimeZoneResolver, DEFAULT_FALLBACK_TZ};
