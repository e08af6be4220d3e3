//! Fan-out of per-store estimation over a bounded blocking pool.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sw_sources::{SourceError, Sources};
use sw_uptime::UptimeEstimator;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::table::{ReportTable, SkippedStore, StoreOutcome};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failures that abort the whole report rather than one store.
#[derive(Debug)]
pub enum AssembleError {
    /// The store registry could not be read.
    ListStores(SourceError),
    /// The worker pool itself failed (closed semaphore, cancelled task).
    Pool(String),
}

impl fmt::Display for AssembleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssembleError::ListStores(e) => write!(f, "store list unavailable: {e}"),
            AssembleError::Pool(msg) => write!(f, "worker pool failure: {msg}"),
        }
    }
}

impl std::error::Error for AssembleError {}

// ---------------------------------------------------------------------------
// ReportAssembler
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct ReportAssembler {
    sources: Sources,
    estimator: UptimeEstimator,
    workers: usize,
}

impl ReportAssembler {
    /// `workers` is clamped to at least 1.
    pub fn new(sources: Sources, fallback_tz: Tz, workers: usize) -> Self {
        let estimator = UptimeEstimator::new(&sources, fallback_tz);
        Self {
            sources,
            estimator,
            workers: workers.max(1),
        }
    }

    /// Same pool size and fallback zone over a different data set.
    pub fn with_sources(&self, sources: Sources) -> Self {
        Self::new(sources, self.estimator.fallback_tz(), self.workers)
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn sources(&self) -> &Sources {
        &self.sources
    }

    /// Estimate every registered store as of `as_of_utc`.
    ///
    /// A store whose inputs fail to load, or whose computation panics, is
    /// recorded in `skipped`; the rest of the batch continues.
    pub async fn run(&self, as_of_utc: DateTime<Utc>) -> Result<ReportTable, AssembleError> {
        let ids = self
            .sources
            .stores
            .list_ids()
            .map_err(AssembleError::ListStores)?;
        let total = ids.len();

        let permits = Arc::new(Semaphore::new(self.workers));
        let mut set: JoinSet<StoreOutcome> = JoinSet::new();

        for store_id in ids {
            let permit = permits
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| AssembleError::Pool(e.to_string()))?;
            let estimator = self.estimator.clone();
            set.spawn_blocking(move || {
                let _permit = permit;
                estimate_one(&estimator, store_id, as_of_utc)
            });
        }

        let mut outcomes = Vec::with_capacity(total);
        while let Some(joined) = set.join_next().await {
            let outcome = joined.map_err(|e| AssembleError::Pool(e.to_string()))?;
            outcomes.push(outcome);
        }

        let table = ReportTable::from_outcomes(as_of_utc, outcomes);
        info!(
            as_of = %as_of_utc,
            stores = total,
            reported = table.rows.len(),
            skipped = table.skipped.len(),
            "report assembled"
        );
        Ok(table)
    }
}

fn estimate_one(estimator: &UptimeEstimator, store_id: String, as_of: DateTime<Utc>) -> StoreOutcome {
    let result = catch_unwind(AssertUnwindSafe(|| estimator.estimate_store(&store_id, as_of)));
    let reason = match result {
        Ok(Ok(report)) => return StoreOutcome::Reported(report),
        Ok(Err(e)) => e.to_string(),
        Err(payload) => format!("panic: {}", panic_message(payload.as_ref())),
    };
    warn!(store_id = %store_id, reason = %reason, "store skipped");
    StoreOutcome::Skipped(SkippedStore { store_id, reason })
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
