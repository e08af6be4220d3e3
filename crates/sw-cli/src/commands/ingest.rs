//! `sw ingest`: CSV directory -> Postgres source tables.

use anyhow::Result;
use std::path::Path;

pub async fn run_ingest(data_dir: &Path, replace: bool) -> Result<()> {
    let data = super::load_csv_dir(data_dir)?;
    let pool = sw_db::connect_from_env().await?;

    let counts = sw_db::insert_raw_rows(
        &pool,
        &data.samples,
        &data.hours,
        &data.timezones,
        replace,
    )
    .await?;

    let s = &data.summary;
    println!("samples_inserted={}", counts.samples);
    println!("samples_rejected={}", s.samples_rejected);
    println!("hours_inserted={}", counts.hours);
    println!("hours_rejected={}", s.hours_rejected);
    println!("timezones_upserted={}", counts.timezones);
    println!("timezones_rejected={}", s.timezones_rejected);
    Ok(())
}
