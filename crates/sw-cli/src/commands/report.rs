//! `sw report`: one job, start to finish, in this process.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use sw_jobs::{JobStatus, ReportService};
use sw_report::{FsReportSink, ReportAssembler};
use sw_sources::{InMemoryStore, Sources};

pub struct ReportArgs {
    pub config_paths: Vec<String>,
    pub as_of: Option<DateTime<Utc>>,
    pub data_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub timeout: Duration,
}

pub async fn run_report(args: ReportArgs) -> Result<()> {
    let (loaded, cfg) = super::load_config(&args.config_paths)?;

    let store = match &args.data_dir {
        Some(dir) => {
            let data = super::load_csv_dir(dir)?;
            if data.summary.samples_rejected > 0 {
                eprintln!(
                    "WARN: {} store_status rows rejected",
                    data.summary.samples_rejected
                );
            }
            data.into_store()
        }
        None => load_db_snapshot(&cfg).await?,
    };

    let output_dir = args
        .output_dir
        .unwrap_or_else(|| PathBuf::from(&cfg.report.output_dir));

    let assembler = ReportAssembler::new(
        Sources::from_shared(Arc::new(store)),
        cfg.fallback_tz()?,
        cfg.report.workers,
    );
    let sink = FsReportSink::new(output_dir, loaded.config_hash.clone());
    let service = ReportService::new(assembler, Arc::new(sink), cfg.report.as_of_policy);

    let snap = service
        .trigger_and_wait(args.as_of, args.timeout)
        .await
        .context("report job did not finish")?;

    println!("report_id={}", snap.job_id);
    println!("status={}", snap.status);
    if let Some(as_of) = snap.as_of_utc {
        println!("as_of_utc={}", as_of.to_rfc3339());
    }
    println!("config_hash={}", loaded.config_hash);

    if snap.status != JobStatus::Complete {
        bail!(
            "report job {} failed: {}",
            snap.job_id,
            snap.error.unwrap_or_default()
        );
    }
    println!("stores_reported={}", snap.stores_reported);
    println!("stores_skipped={}", snap.stores_skipped);
    println!("output={}", snap.output_location.unwrap_or_default());
    Ok(())
}

async fn load_db_snapshot(cfg: &sw_config::EngineConfig) -> Result<InMemoryStore> {
    let secrets = sw_config::resolve_secrets(cfg);
    let url = secrets
        .require_database_url()
        .context("pass --data-dir or set the database url")?;
    let pool = sw_db::connect(url).await?;
    sw_db::load_snapshot(&pool).await
}
