//! sw-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, loads config, picks
//! the data origin, builds the shared state, wires middleware, and starts
//! the HTTP server. All route handlers live in `routes.rs`; all shared state
//! types live in `state.rs`.

use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::http::{HeaderValue, Method};
use sw_config::{EngineConfig, LoadedConfig, UnusedKeyPolicy};
use sw_daemon::{routes, state};
use sw_jobs::ReportService;
use sw_report::{FsReportSink, ReportAssembler};
use sw_sources::Sources;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, warn, Level};

const ENV_CONFIG: &str = "SW_CONFIG";
const ENV_DATA_DIR: &str = "SW_DATA_DIR";
const ENV_DAEMON_ADDR: &str = "SW_DAEMON_ADDR";

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env.local if present (dev convenience).
    // Silent if the file does not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let (loaded, cfg) = load_config()?;
    info!(config_hash = %loaded.config_hash, "config loaded");

    let origin = data_origin(&cfg).await?;
    let store = origin
        .load()
        .await?
        .context("startup data origin produced no snapshot")?;

    let assembler = ReportAssembler::new(
        Sources::from_shared(Arc::new(store)),
        cfg.fallback_tz()?,
        cfg.report.workers,
    );
    let sink = FsReportSink::new(&cfg.report.output_dir, loaded.config_hash.clone());
    let service = ReportService::new(assembler, Arc::new(sink), cfg.report.as_of_policy);

    let shared = Arc::new(state::AppState::new(service, cfg.wait_timeout(), origin));

    let app = routes::build_router(Arc::clone(&shared))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    let addr = bind_addr_from_env().unwrap_or_else(|| SocketAddr::from(([127, 0, 0, 1], 8899)));
    info!(
        origin = %shared.origin.describe(),
        workers = cfg.report.workers,
        output_dir = %cfg.report.output_dir,
        "sw-daemon listening on http://{}",
        addr
    );

    axum::serve(tokio::net::TcpListener::bind(addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// Layers from SW_CONFIG (comma-separated paths); built-in defaults if unset.
fn load_config() -> Result<(LoadedConfig, EngineConfig)> {
    let loaded = match std::env::var(ENV_CONFIG) {
        Ok(raw) if !raw.trim().is_empty() => {
            let paths: Vec<&str> = raw.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
            sw_config::load_layered_yaml(&paths)?
        }
        _ => sw_config::load_layered_yaml_from_strings(&[])?,
    };

    let unused = sw_config::report_unused_keys(&loaded.config_json, UnusedKeyPolicy::Warn)?;
    for ptr in &unused.unused_leaf_pointers {
        warn!(pointer = %ptr, "unused config key");
    }

    let cfg = EngineConfig::from_config_json(&loaded.config_json)?;
    Ok((loaded, cfg))
}

/// SW_DATA_DIR wins; otherwise Postgres via the env var named in config.
async fn data_origin(cfg: &EngineConfig) -> Result<state::DataOrigin> {
    if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
        if !dir.trim().is_empty() {
            return Ok(state::DataOrigin::DataDir(PathBuf::from(dir.trim())));
        }
    }
    let secrets = sw_config::resolve_secrets(cfg);
    let url = secrets
        .require_database_url()
        .with_context(|| format!("set {ENV_DATA_DIR} or a database url"))?;
    let pool = sw_db::connect(url).await?;
    Ok(state::DataOrigin::Database(pool))
}

fn bind_addr_from_env() -> Option<SocketAddr> {
    std::env::var(ENV_DAEMON_ADDR).ok()?.parse().ok()
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "ctrl_c handler failed");
    }
    info!("shutdown requested");
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any)
}
