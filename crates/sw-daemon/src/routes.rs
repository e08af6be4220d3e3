//! Axum router and all HTTP handlers for sw-daemon.
//!
//! `build_router` is the single entry point; `main.rs` calls it and attaches
//! middleware layers.
//!
//! Job conditions map to distinct statuses: unknown id 404, malformed id or
//! body 400, output not ready 409, wait timeout 408, failed job or unreadable
//! output 500.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use sw_jobs::{JobError, JobStatus};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    api_types::{
        ErrorResponse, HealthResponse, ReloadResponse, ReportQuery, ReportStatusResponse,
        TriggerRequest, TriggerResponse,
    },
    state::AppState,
};

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Build the complete application router wired to the given shared state.
///
/// Middleware layers (CORS, tracing) are **not** applied here; `main.rs`
/// attaches them after this call so tests can use the bare router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/reload", post(reload))
        .route("/trigger_report", post(trigger_report))
        .route("/get_report", get(get_report))
        .route("/download/:report_id", get(download))
        .route("/trigger_and_download_report", post(trigger_and_download))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn error_response(status: StatusCode, error: impl Into<String>, report_id: Option<Uuid>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
            report_id,
        }),
    )
        .into_response()
}

fn job_error_status(err: &JobError) -> StatusCode {
    match err {
        JobError::NotFound { .. } => StatusCode::NOT_FOUND,
        JobError::NotReady { .. } => StatusCode::CONFLICT,
        JobError::Timeout { .. } => StatusCode::REQUEST_TIMEOUT,
        JobError::Failed { .. }
        | JobError::OutputUnavailable { .. }
        | JobError::IllegalTransition { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn job_error_response(err: JobError) -> Response {
    let status = job_error_status(&err);
    error_response(status, err.to_string(), Some(err.job_id()))
}

fn parse_report_id(raw: &str) -> Result<Uuid, Response> {
    Uuid::parse_str(raw.trim()).map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("report_id '{raw}' is not a valid UUID"),
            None,
        )
    })
}

/// Empty body means "no as-of requested".
fn parse_trigger_body(body: &Bytes) -> Result<Option<DateTime<Utc>>, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    serde_json::from_slice::<TriggerRequest>(body)
        .map(|req| req.as_of)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, format!("invalid request body: {e}"), None))
}

fn csv_response(report_id: Uuid, bytes: Vec<u8>) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{report_id}.csv\""),
            ),
        ],
        bytes,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// GET /v1/health
// ---------------------------------------------------------------------------

pub(crate) async fn health(State(st): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            ok: true,
            service: st.build.service.to_string(),
            version: st.build.version.to_string(),
            data_origin: st.origin.describe(),
        }),
    )
}

// ---------------------------------------------------------------------------
// POST /v1/reload
// ---------------------------------------------------------------------------

pub(crate) async fn reload(State(st): State<Arc<AppState>>) -> Response {
    match st.reload().await {
        Ok(Some(stats)) => (
            StatusCode::OK,
            Json(ReloadResponse {
                ok: true,
                stores: stats.stores,
                samples: stats.samples,
            }),
        )
            .into_response(),
        Ok(None) => error_response(
            StatusCode::CONFLICT,
            format!("data origin '{}' cannot be reloaded", st.origin.describe()),
            None,
        ),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "reload failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, format!("reload failed: {e:#}"), None)
        }
    }
}

// ---------------------------------------------------------------------------
// POST /trigger_report
// ---------------------------------------------------------------------------

pub(crate) async fn trigger_report(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    let as_of = match parse_trigger_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let report_id = st.service().await.trigger(as_of).await;
    info!(report_id = %report_id, "trigger_report");
    (StatusCode::OK, Json(TriggerResponse { report_id })).into_response()
}

// ---------------------------------------------------------------------------
// GET /get_report?report_id=
// ---------------------------------------------------------------------------

pub(crate) async fn get_report(
    State(st): State<Arc<AppState>>,
    Query(q): Query<ReportQuery>,
) -> Response {
    let report_id = match parse_report_id(&q.report_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match st.service().await.status(report_id).await {
        Ok(job) => {
            let download_path =
                (job.status == JobStatus::Complete).then(|| format!("/download/{report_id}"));
            (
                StatusCode::OK,
                Json(ReportStatusResponse {
                    report_id,
                    job,
                    download_path,
                }),
            )
                .into_response()
        }
        Err(e) => job_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// GET /download/:report_id
// ---------------------------------------------------------------------------

pub(crate) async fn download(
    State(st): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let report_id = match parse_report_id(&raw_id) {
        Ok(id) => id,
        Err(resp) => return resp,
    };
    match st.service().await.fetch_output(report_id).await {
        Ok(bytes) => csv_response(report_id, bytes),
        Err(e) => job_error_response(e),
    }
}

// ---------------------------------------------------------------------------
// POST /trigger_and_download_report
// ---------------------------------------------------------------------------

/// Trigger, wait up to the configured bound, then return the CSV. On timeout
/// the job keeps running and its id is in the 408 body for later polling.
pub(crate) async fn trigger_and_download(State(st): State<Arc<AppState>>, body: Bytes) -> Response {
    let as_of = match parse_trigger_body(&body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let svc = st.service().await;
    let snap = match svc.trigger_and_wait(as_of, st.wait_timeout).await {
        Ok(snap) => snap,
        Err(e) => return job_error_response(e),
    };
    match svc.fetch_output(snap.job_id).await {
        Ok(bytes) => csv_response(snap.job_id, bytes),
        Err(e) => job_error_response(e),
    }
}
