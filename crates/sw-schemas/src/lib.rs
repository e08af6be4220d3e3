//! Shared data model for the StoreWatch workspace.
//!
//! Plain data only. Parsing of raw text rows lives with the component that
//! owns the defaulting policy (calendar, timeline); persistence lives in
//! `sw-db`; nothing here performs IO.

use chrono::{DateTime, NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Samples
// ---------------------------------------------------------------------------

/// Observed operational state of a store at one poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SampleStatus {
    Active,
    Inactive,
}

impl SampleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SampleStatus::Active => "active",
            SampleStatus::Inactive => "inactive",
        }
    }

    /// Case-insensitive parse. Unknown values return `None` so callers can
    /// drop the row instead of failing the batch.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "active" => Some(SampleStatus::Active),
            "inactive" => Some(SampleStatus::Inactive),
            _ => None,
        }
    }
}

/// A validated status poll. Immutable once ingested; ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSample {
    pub store_id: String,
    pub timestamp_utc: DateTime<Utc>,
    pub status: SampleStatus,
}

/// A status row exactly as a source returned it (CSV / DB text columns).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSample {
    pub store_id: String,
    pub timestamp_utc: String,
    pub status: String,
}

impl RawSample {
    pub fn new(
        store_id: impl Into<String>,
        timestamp_utc: impl Into<String>,
        status: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            timestamp_utc: timestamp_utc.into(),
            status: status.into(),
        }
    }
}

/// Parse a UTC timestamp in any of the accepted textual forms:
///
/// - RFC 3339 (`2023-01-25T18:13:22Z`, any offset, converted to UTC)
/// - `YYYY-MM-DD HH:MM:SS[.frac] UTC`
/// - `YYYY-MM-DD HH:MM:SS[.frac]` (taken as UTC)
///
/// Returns `None` for anything else.
pub fn parse_timestamp_utc(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive_part = s.strip_suffix("UTC").map(str::trim_end).unwrap_or(s);
    NaiveDateTime::parse_from_str(naive_part, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

// ---------------------------------------------------------------------------
// Configuration rows
// ---------------------------------------------------------------------------

/// One configured business-hours row, unvalidated.
///
/// `day_of_week` is `0..=6` with 0 = Monday; times are local `HH:MM[:SS]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBusinessHours {
    pub store_id: String,
    pub day_of_week: String,
    pub start_time_local: String,
    pub end_time_local: String,
}

impl RawBusinessHours {
    pub fn new(
        store_id: impl Into<String>,
        day_of_week: impl Into<String>,
        start_time_local: impl Into<String>,
        end_time_local: impl Into<String>,
    ) -> Self {
        Self {
            store_id: store_id.into(),
            day_of_week: day_of_week.into(),
            start_time_local: start_time_local.into(),
            end_time_local: end_time_local.into(),
        }
    }
}

/// Configured timezone for one store. At most one per store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreTimezone {
    pub store_id: String,
    pub zone_id: String,
}

// ---------------------------------------------------------------------------
// Windows
// ---------------------------------------------------------------------------

/// Trailing window ending at the report's as-of instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    Hour,
    Day,
    Week,
}

impl WindowKind {
    /// All windows, narrowest first.
    pub const ALL: [WindowKind; 3] = [WindowKind::Hour, WindowKind::Day, WindowKind::Week];

    pub fn duration(&self) -> TimeDelta {
        match self {
            WindowKind::Hour => TimeDelta::hours(1),
            WindowKind::Day => TimeDelta::days(1),
            WindowKind::Week => TimeDelta::weeks(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WindowKind::Hour => "hour",
            WindowKind::Day => "day",
            WindowKind::Week => "week",
        }
    }

    /// Widest window; bounds the timeline lookback horizon.
    pub fn widest() -> WindowKind {
        WindowKind::Week
    }
}

/// How a report picks its as-of instant when the caller gives none.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AsOfPolicy {
    /// The wall clock at job start.
    #[default]
    WallClock,
    /// The newest sample timestamp in the data (for replaying static data).
    LatestSample,
}

/// Up/down minutes for one store and one window.
///
/// `uptime_minutes + downtime_minutes` equals the business-hours minutes
/// contained in the window, never the wall-clock window length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowResult {
    pub store_id: String,
    pub window: WindowKind,
    pub uptime_minutes: i64,
    pub downtime_minutes: i64,
}

impl WindowResult {
    pub fn business_minutes(&self) -> i64 {
        self.uptime_minutes + self.downtime_minutes
    }
}

/// The three window results for one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreReport {
    pub store_id: String,
    pub last_hour: WindowResult,
    pub last_day: WindowResult,
    pub last_week: WindowResult,
}

impl StoreReport {
    pub fn window(&self, kind: WindowKind) -> &WindowResult {
        match kind {
            WindowKind::Hour => &self.last_hour,
            WindowKind::Day => &self.last_day,
            WindowKind::Week => &self.last_week,
        }
    }

    pub fn to_row(&self) -> ReportRow {
        ReportRow {
            store_id: self.store_id.clone(),
            uptime_last_hour: self.last_hour.uptime_minutes,
            downtime_last_hour: self.last_hour.downtime_minutes,
            uptime_last_day: self.last_day.uptime_minutes,
            downtime_last_day: self.last_day.downtime_minutes,
            uptime_last_week: self.last_week.uptime_minutes,
            downtime_last_week: self.last_week.downtime_minutes,
        }
    }
}

// ---------------------------------------------------------------------------
// Output table
// ---------------------------------------------------------------------------

/// Fixed output column order. `ReportRow` field order must match.
pub const REPORT_COLUMNS: [&str; 7] = [
    "store_id",
    "uptime_last_hour",
    "downtime_last_hour",
    "uptime_last_day",
    "downtime_last_day",
    "uptime_last_week",
    "downtime_last_week",
];

/// One flattened output row; all durations in whole minutes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRow {
    pub store_id: String,
    pub uptime_last_hour: i64,
    pub downtime_last_hour: i64,
    pub uptime_last_day: i64,
    pub downtime_last_day: i64,
    pub uptime_last_week: i64,
    pub downtime_last_week: i64,
}
