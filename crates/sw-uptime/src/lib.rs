//! Uptime/downtime estimation for StoreWatch.
//!
//! - [`timeline`]: one store's cleaned, ordered samples.
//! - [`decompose`]: business-hours measure of a UTC interval.
//! - [`estimator`]: the hour/day/week sweep.
//!
//! Pure computation over inputs obtained through `sw-sources`. No IO of its
//! own, no clocks: the caller passes `now`.

pub mod decompose;
pub mod estimator;
pub mod timeline;

pub use decompose::{business_duration, business_minutes, local_day_segments, DaySegment};
pub use estimator::{estimate_windows, sweep, EstimateError, UptimeEstimator, WindowTally};
pub use timeline::{LoadStats, StatusTimeline, TimelineError};
