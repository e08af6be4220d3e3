//! End to end: fixture -> CSV data dir -> loader -> ReportService -> FS sink
//! -> CSV output.
//!
//! Reference dates:
//!   2023-01-23 Mon (America/Chicago CST = UTC-6, America/New_York EST = UTC-5)

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, TimeZone, Timelike, Utc};
use sw_jobs::JobStatus;
use sw_report::FsReportSink;
use sw_sources::ingest_csv::load_data_dir;
use sw_testkit::{memory_service, parse_report_csv, service_with_sink, temp_dir, Fixture};

fn utc(y: i32, m: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, mi, 0).unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn csv_dir_round_trip_through_fs_sink() -> anyhow::Result<()> {
    // Monday 17:00 CST.
    let as_of = utc(2023, 1, 23, 23, 0);

    let fixture = Fixture::new()
        .timezone("chi", "America/Chicago")
        .hours("chi", 0, "09:00:00", "17:00:00")
        .sample("chi", utc(2023, 1, 23, 15, 0), "active")
        .sample("chi", utc(2023, 1, 23, 18, 0), "inactive")
        .sample("chi", utc(2023, 1, 23, 21, 0), "active")
        // No configuration at all: 24x7 in the fallback zone.
        .sample("bare", as_of - TimeDelta::minutes(30), "active")
        // Unknown zone falls back; status text is case-insensitive.
        .timezone("odd", "Mars/Olympus")
        .sample("odd", as_of - TimeDelta::minutes(10), "ACTIVE");

    let data = temp_dir()?;
    fixture.write_csv_dir(data.path())?;

    let loaded = load_data_dir(data.path())?;
    assert_eq!(loaded.summary.samples_read, 5);
    assert_eq!(loaded.summary.hours_read, 1);
    assert_eq!(loaded.summary.timezones_read, 2);

    let out = temp_dir()?;
    let sink = Arc::new(FsReportSink::new(out.path(), "test-hash"));
    let svc = service_with_sink(loaded.into_store(), chrono_tz::America::Chicago, 4, sink);

    let snap = svc
        .trigger_and_wait(Some(as_of), Duration::from_secs(10))
        .await?;
    assert_eq!(snap.status, JobStatus::Complete);
    assert_eq!(snap.stores_reported, 3);
    assert_eq!(snap.stores_skipped, 0);

    let location = snap.output_location.clone().unwrap();
    assert!(location.ends_with(&format!("{}.csv", snap.job_id)));

    let rows = parse_report_csv(&svc.fetch_output(snap.job_id).await?)?;
    assert_eq!(rows.keys().cloned().collect::<Vec<_>>(), vec!["bare", "chi", "odd"]);

    let chi = &rows["chi"];
    assert_eq!((chi.uptime_last_hour, chi.downtime_last_hour), (60, 0));
    assert_eq!((chi.uptime_last_day, chi.downtime_last_day), (300, 180));
    assert_eq!((chi.uptime_last_week, chi.downtime_last_week), (300, 180));

    let bare = &rows["bare"];
    assert_eq!((bare.uptime_last_hour, bare.downtime_last_hour), (30, 30));

    let odd = &rows["odd"];
    assert_eq!((odd.uptime_last_hour, odd.downtime_last_hour), (10, 50));

    let manifest: serde_json::Value = serde_json::from_slice(&std::fs::read(
        out.path().join(format!("{}.manifest.json", snap.job_id)),
    )?)?;
    assert_eq!(manifest["config_hash"], "test-hash");
    assert_eq!(manifest["rows"], 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn many_stores_partition_business_minutes() -> anyhow::Result<()> {
    let as_of = utc(2023, 1, 27, 12, 0);
    let from = as_of - TimeDelta::weeks(1);

    let mut fixture = Fixture::new();
    for i in 0..40u32 {
        let id = format!("store-{i:02}");
        let zone = ["America/Chicago", "America/New_York", "Asia/Kolkata", "UTC"][i as usize % 4];
        fixture = fixture.timezone(&id, zone);
        if i % 3 != 0 {
            fixture = fixture.daily_hours(&id, "08:00", "20:00");
        }
        if i % 5 == 0 {
            fixture = fixture.hours(&id, 4, "22:00", "02:00");
        }
        // Down during the first quarter of every UTC hour.
        fixture = fixture.polled(&id, from, as_of, TimeDelta::minutes(15), |t| {
            if t.minute() < 15 {
                "inactive"
            } else {
                "active"
            }
        });
    }

    let svc = memory_service(fixture.to_store(), chrono_tz::UTC, 8);
    let snap = svc
        .trigger_and_wait(Some(as_of), Duration::from_secs(30))
        .await?;
    assert_eq!(snap.status, JobStatus::Complete);
    assert_eq!(snap.stores_reported, 40);

    let rows = parse_report_csv(&svc.fetch_output(snap.job_id).await?)?;
    assert_eq!(rows.len(), 40);
    for (id, row) in &rows {
        for (up, down) in [
            (row.uptime_last_hour, row.downtime_last_hour),
            (row.uptime_last_day, row.downtime_last_day),
            (row.uptime_last_week, row.downtime_last_week),
        ] {
            assert!(up >= 0 && down >= 0, "{id}: negative minutes");
        }
        assert!(row.uptime_last_hour + row.downtime_last_hour <= 60, "{id}");
        assert!(row.uptime_last_day + row.downtime_last_day <= 24 * 60, "{id}");
        assert!(row.uptime_last_week + row.downtime_last_week <= 7 * 24 * 60, "{id}");
    }

    // No hours configured: 24x7, so every window is all business time.
    let always = &rows["store-03"];
    assert_eq!(always.uptime_last_week + always.downtime_last_week, 7 * 24 * 60);
    assert_eq!(always.uptime_last_week, 7 * 24 * 45);
    assert_eq!((always.uptime_last_hour, always.downtime_last_hour), (45, 15));
    Ok(())
}

#[tokio::test]
async fn rerun_over_same_data_is_identical() -> anyhow::Result<()> {
    let as_of = utc(2023, 1, 23, 23, 0);
    let fixture = Fixture::new()
        .timezone("a", "America/New_York")
        .daily_hours("a", "10:00", "18:00")
        .polled("a", as_of - TimeDelta::days(3), as_of, TimeDelta::minutes(47), |t| {
            if t.hour() % 2 == 0 {
                "active"
            } else {
                "inactive"
            }
        });

    let svc = memory_service(fixture.to_store(), chrono_tz::UTC, 2);
    let first = svc.trigger_and_wait(Some(as_of), Duration::from_secs(10)).await?;
    let second = svc.trigger_and_wait(Some(as_of), Duration::from_secs(10)).await?;
    assert_ne!(first.job_id, second.job_id);
    assert_eq!(
        svc.fetch_output(first.job_id).await?,
        svc.fetch_output(second.job_id).await?
    );
    Ok(())
}
