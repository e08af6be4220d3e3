//! Store → IANA zone resolution.

use std::sync::Arc;

use chrono_tz::Tz;
use sw_sources::TimezoneSource;
use tracing::warn;

/// Zone used when a store has none configured, or an unusable one.
pub const DEFAULT_FALLBACK_TZ: Tz = chrono_tz::America::Chicago;

/// Resolves each store's zone, falling back instead of failing.
#[derive(Clone)]
pub struct TimeZoneResolver {
    source: Arc<dyn TimezoneSource>,
    fallback: Tz,
}

impl TimeZoneResolver {
    pub fn new(source: Arc<dyn TimezoneSource>, fallback: Tz) -> Self {
        Self { source, fallback }
    }

    pub fn fallback(&self) -> Tz {
        self.fallback
    }

    /// Configured zone if present and valid; otherwise the fallback. A source
    /// error also falls back (logged), since one store's zone lookup should
    /// not sink its whole report.
    pub fn resolve(&self, store_id: &str) -> Tz {
        match self.source.query(store_id) {
            Ok(Some(raw)) => match parse_zone(&raw) {
                Some(tz) => tz,
                None => {
                    warn!(store_id, zone = %raw, fallback = %self.fallback, "unknown zone id; using fallback");
                    self.fallback
                }
            },
            Ok(None) => self.fallback,
            Err(e) => {
                warn!(store_id, error = %e, fallback = %self.fallback, "timezone lookup failed; using fallback");
                self.fallback
            }
        }
    }
}

/// Parse an IANA zone name, e.g. `Asia/Kolkata`. Surrounding whitespace is
/// ignored; anything unrecognised is `None`.
pub fn parse_zone(raw: &str) -> Option<Tz> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<Tz>().ok()
}
