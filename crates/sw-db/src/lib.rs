//! Postgres persistence for StoreWatch source data.
//!
//! Tables hold raw text exactly as ingested. A report job never queries
//! Postgres per store: it materializes one [`InMemoryStore`] snapshot up front
//! with [`load_snapshot`] and computes against that, so a job sees a single
//! consistent view of the data.

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use sw_schemas::{RawBusinessHours, RawSample, StoreTimezone};
use sw_sources::InMemoryStore;
use tracing::info;

pub const ENV_DB_URL: &str = "SW_DATABASE_URL";

/// Connect to Postgres using SW_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;
    connect(&url).await
}

pub async fn connect(url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct DbStatus {
    pub ok: bool,
    pub has_store_status_table: bool,
}

/// Connectivity plus schema presence.
pub async fn status(pool: &PgPool) -> Result<DbStatus> {
    let (one,): (i32,) = sqlx::query_as::<_, (i32,)>("select 1")
        .fetch_one(pool)
        .await
        .context("status connectivity query failed")?;

    let (exists,): (bool,) = sqlx::query_as::<_, (bool,)>(
        r#"
        select exists (
            select 1
            from information_schema.tables
            where table_schema='public' and table_name='store_status'
        )
        "#,
    )
    .fetch_one(pool)
    .await
    .context("status table-exists query failed")?;

    Ok(DbStatus {
        ok: one == 1,
        has_store_status_table: exists,
    })
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertCounts {
    pub samples: u64,
    pub hours: u64,
    pub timezones: u64,
}

/// Insert one batch of raw rows in a single transaction.
///
/// Samples and hours are appended. Timezones upsert on `store_id` (a store
/// has at most one zone). With `replace`, all three tables are truncated
/// first inside the same transaction.
pub async fn insert_raw_rows(
    pool: &PgPool,
    samples: &[RawSample],
    hours: &[RawBusinessHours],
    timezones: &[StoreTimezone],
    replace: bool,
) -> Result<InsertCounts> {
    let mut tx = pool.begin().await.context("begin ingest tx failed")?;

    if replace {
        sqlx::query("truncate store_status, menu_hours, store_timezones")
            .execute(&mut *tx)
            .await
            .context("truncate source tables failed")?;
    }

    let mut counts = InsertCounts::default();

    for s in samples {
        let res = sqlx::query(
            "insert into store_status (store_id, status, timestamp_utc) values ($1, $2, $3)",
        )
        .bind(&s.store_id)
        .bind(&s.status)
        .bind(&s.timestamp_utc)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert store_status failed store_id={}", s.store_id))?;
        counts.samples += res.rows_affected();
    }

    for h in hours {
        let res = sqlx::query(
            r#"
            insert into menu_hours (store_id, day_of_week, start_time_local, end_time_local)
            values ($1, $2, $3, $4)
            "#,
        )
        .bind(&h.store_id)
        .bind(&h.day_of_week)
        .bind(&h.start_time_local)
        .bind(&h.end_time_local)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("insert menu_hours failed store_id={}", h.store_id))?;
        counts.hours += res.rows_affected();
    }

    for tz in timezones {
        let res = sqlx::query(
            r#"
            insert into store_timezones (store_id, timezone_str) values ($1, $2)
            on conflict (store_id) do update set timezone_str = excluded.timezone_str
            "#,
        )
        .bind(&tz.store_id)
        .bind(&tz.zone_id)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("upsert store_timezones failed store_id={}", tz.store_id))?;
        counts.timezones += res.rows_affected();
    }

    tx.commit().await.context("commit ingest tx failed")?;

    info!(
        samples = counts.samples,
        hours = counts.hours,
        timezones = counts.timezones,
        replace,
        "ingested raw rows"
    );
    Ok(counts)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Read every source table into an in-memory snapshot.
///
/// Timestamps are text, so range filtering happens in memory after parsing
/// (`InMemoryStore::query`); unparseable rows still reach the timeline and
/// are counted there.
pub async fn load_snapshot(pool: &PgPool) -> Result<InMemoryStore> {
    let mut store = InMemoryStore::new();

    let rows = sqlx::query(
        "select store_id, status, timestamp_utc from store_status order by store_id, id",
    )
    .fetch_all(pool)
    .await
    .context("load store_status failed")?;
    let n_samples = rows.len();
    for row in rows {
        store.push_sample(RawSample {
            store_id: row.try_get("store_id")?,
            timestamp_utc: row.try_get("timestamp_utc")?,
            status: row.try_get("status")?,
        });
    }

    let rows = sqlx::query(
        r#"
        select store_id, day_of_week, start_time_local, end_time_local
        from menu_hours
        order by store_id, id
        "#,
    )
    .fetch_all(pool)
    .await
    .context("load menu_hours failed")?;
    let n_hours = rows.len();
    for row in rows {
        store.push_hours(RawBusinessHours {
            store_id: row.try_get("store_id")?,
            day_of_week: row.try_get("day_of_week")?,
            start_time_local: row.try_get("start_time_local")?,
            end_time_local: row.try_get("end_time_local")?,
        });
    }

    let rows = sqlx::query("select store_id, timezone_str from store_timezones")
        .fetch_all(pool)
        .await
        .context("load store_timezones failed")?;
    let n_tz = rows.len();
    for row in rows {
        let store_id: String = row.try_get("store_id")?;
        let zone: String = row.try_get("timezone_str")?;
        store.set_timezone(store_id, zone);
    }

    info!(
        samples = n_samples,
        hours = n_hours,
        timezones = n_tz,
        "loaded db snapshot"
    );
    Ok(store)
}
