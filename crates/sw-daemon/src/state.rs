//! Shared runtime state for sw-daemon.
//!
//! Handlers receive `State<Arc<AppState>>` from Axum. The report service is
//! behind a lock only so `/v1/reload` can swap in fresh input data; handlers
//! clone the service out and never hold the lock across a job.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sw_jobs::ReportService;
use sw_sources::{ingest_csv, InMemoryStore, Sources, StoreRegistry};
use tokio::sync::RwLock;
use tracing::info;

// ---------------------------------------------------------------------------
// BuildInfo
// ---------------------------------------------------------------------------

/// Static build metadata included in health responses.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BuildInfo {
    pub service: &'static str,
    pub version: &'static str,
}

impl Default for BuildInfo {
    fn default() -> Self {
        Self {
            service: "sw-daemon",
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

// ---------------------------------------------------------------------------
// DataOrigin
// ---------------------------------------------------------------------------

/// Where the daemon's input data comes from.
#[derive(Clone, Debug)]
pub enum DataOrigin {
    /// Snapshot of the Postgres source tables.
    Database(PgPool),
    /// `store_status.csv` / `menu_hours.csv` / `timezones.csv` in a directory.
    DataDir(PathBuf),
    /// Data handed in at construction; cannot be reloaded.
    Fixed,
}

impl DataOrigin {
    pub fn describe(&self) -> String {
        match self {
            DataOrigin::Database(_) => "database".to_string(),
            DataOrigin::DataDir(dir) => format!("data_dir:{}", dir.display()),
            DataOrigin::Fixed => "fixed".to_string(),
        }
    }

    /// Materialize a fresh snapshot. `None` for [`DataOrigin::Fixed`].
    pub async fn load(&self) -> Result<Option<InMemoryStore>> {
        match self {
            DataOrigin::Database(pool) => Ok(Some(sw_db::load_snapshot(pool).await?)),
            DataOrigin::DataDir(dir) => {
                let dir = dir.clone();
                let loaded = tokio::task::spawn_blocking(move || ingest_csv::load_data_dir(&dir))
                    .await
                    .context("data dir load task failed")?
                    .context("data dir load failed")?;
                Ok(Some(loaded.into_store()))
            }
            DataOrigin::Fixed => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// AppState
// ---------------------------------------------------------------------------

pub struct AppState {
    pub build: BuildInfo,
    /// Bound for `POST /trigger_and_download_report`.
    pub wait_timeout: Duration,
    pub origin: DataOrigin,
    service: RwLock<ReportService>,
}

/// Outcome of a successful reload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReloadStats {
    pub stores: usize,
    pub samples: usize,
}

impl AppState {
    pub fn new(service: ReportService, wait_timeout: Duration, origin: DataOrigin) -> Self {
        Self {
            build: BuildInfo::default(),
            wait_timeout,
            origin,
            service: RwLock::new(service),
        }
    }

    /// The service new jobs should run on.
    pub async fn service(&self) -> ReportService {
        self.service.read().await.clone()
    }

    /// Re-read the data origin and route subsequent jobs to the new snapshot.
    /// `Ok(None)` when the origin is not reloadable.
    pub async fn reload(&self) -> Result<Option<ReloadStats>> {
        let Some(store) = self.origin.load().await? else {
            return Ok(None);
        };
        let stats = ReloadStats {
            stores: store.list_ids().map(|ids| ids.len()).unwrap_or(0),
            samples: store.sample_count(),
        };

        let mut guard = self.service.write().await;
        let next = guard.with_sources(Sources::from_shared(Arc::new(store)));
        *guard = next;
        drop(guard);

        info!(
            origin = %self.origin.describe(),
            stores = stats.stores,
            samples = stats.samples,
            "input data reloaded"
        );
        Ok(Some(stats))
    }
}
