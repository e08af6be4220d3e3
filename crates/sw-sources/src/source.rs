//! Collaborator boundary for raw store data.
//!
//! This module defines **only** the source traits and their error type.
//! No parsing policy, no estimation, no DB logic belong here: sources hand
//! back raw rows and the calendar / timeline decide what is usable.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sw_schemas::{RawBusinessHours, RawSample};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that a source implementation may return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// Storage or transport failure (DB down, file unreadable).
    Transport(String),
    /// Stored data could not be decoded into rows at all.
    Decode(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Transport(msg) => write!(f, "source transport error: {msg}"),
            SourceError::Decode(msg) => write!(f, "source decode error: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Status polls per store.
///
/// `query` returns rows for `store_id` whose timestamps fall in
/// `[from_utc, to_utc]`, ascending where the source can order them. Rows the
/// source cannot index by time (unparseable timestamps) may be passed through;
/// the timeline drops them.
pub trait StatusSampleSource: Send + Sync {
    fn query(
        &self,
        store_id: &str,
        from_utc: DateTime<Utc>,
        to_utc: DateTime<Utc>,
    ) -> Result<Vec<RawSample>, SourceError>;

    /// Newest parseable sample timestamp across all stores, if the source can
    /// tell. Used by the `latest_sample` as-of policy.
    fn latest_timestamp(&self) -> Result<Option<DateTime<Utc>>, SourceError> {
        Ok(None)
    }
}

/// Weekly business-hours rows per store. Empty means "always open".
pub trait BusinessHoursSource: Send + Sync {
    fn query(&self, store_id: &str) -> Result<Vec<RawBusinessHours>, SourceError>;
}

/// Configured IANA zone string per store, if any.
pub trait TimezoneSource: Send + Sync {
    fn query(&self, store_id: &str) -> Result<Option<String>, SourceError>;
}

/// The set of stores a full report covers.
pub trait StoreRegistry: Send + Sync {
    fn list_ids(&self) -> Result<BTreeSet<String>, SourceError>;
}

// ---------------------------------------------------------------------------
// Bundle
// ---------------------------------------------------------------------------

/// All four collaborators, shareable across worker threads.
#[derive(Clone)]
pub struct Sources {
    pub samples: Arc<dyn StatusSampleSource>,
    pub hours: Arc<dyn BusinessHoursSource>,
    pub timezones: Arc<dyn TimezoneSource>,
    pub stores: Arc<dyn StoreRegistry>,
}

impl Sources {
    /// Use one backing value for every collaborator.
    pub fn from_shared<S>(store: Arc<S>) -> Self
    where
        S: StatusSampleSource + BusinessHoursSource + TimezoneSource + StoreRegistry + 'static,
    {
        Self {
            samples: store.clone(),
            hours: store.clone(),
            timezones: store.clone(),
            stores: store,
        }
    }
}

impl fmt::Debug for Sources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sources").finish_non_exhaustive()
    }
}
