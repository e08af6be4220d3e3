//! Request and response types for all sw-daemon HTTP endpoints.
//!
//! No business logic lives here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sw_jobs::JobSnapshot;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// /v1/health
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub service: String,
    pub version: String,
    /// `database`, `data_dir:<path>` or `fixed`.
    pub data_origin: String,
}

// ---------------------------------------------------------------------------
// /trigger_report  /trigger_and_download_report
// ---------------------------------------------------------------------------

/// Optional request body. An empty body means "use the configured policy".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerRequest {
    pub as_of: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub report_id: Uuid,
}

// ---------------------------------------------------------------------------
// /get_report
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ReportQuery {
    pub report_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportStatusResponse {
    pub report_id: Uuid,
    #[serde(flatten)]
    pub job: JobSnapshot,
    /// Set once the report can be downloaded.
    pub download_path: Option<String>,
}

// ---------------------------------------------------------------------------
// /v1/reload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReloadResponse {
    pub ok: bool,
    pub stores: usize,
    pub samples: usize,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    /// Present when the error concerns a specific report.
    pub report_id: Option<Uuid>,
}
