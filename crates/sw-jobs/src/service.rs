//! The report-generation service consumed by the daemon and the CLI.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use sw_report::{ReportAssembler, ReportSink};
use sw_schemas::AsOfPolicy;
use sw_sources::Sources;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::JobError;
use crate::record::{JobSnapshot, JobStatus};
use crate::registry::{JobRegistry, JobWriter};

/// Owns the job registry; cheap to clone (all shared state is behind `Arc`).
#[derive(Clone)]
pub struct ReportService {
    registry: Arc<JobRegistry>,
    assembler: ReportAssembler,
    sink: Arc<dyn ReportSink>,
    as_of_policy: AsOfPolicy,
}

impl ReportService {
    pub fn new(assembler: ReportAssembler, sink: Arc<dyn ReportSink>, as_of_policy: AsOfPolicy) -> Self {
        Self {
            registry: Arc::new(JobRegistry::new()),
            assembler,
            sink,
            as_of_policy,
        }
    }

    /// A service over new input data that shares this one's job registry
    /// and sink. Jobs already running keep the data they started with.
    pub fn with_sources(&self, sources: Sources) -> Self {
        Self {
            registry: self.registry.clone(),
            assembler: self.assembler.with_sources(sources),
            sink: self.sink.clone(),
            as_of_policy: self.as_of_policy,
        }
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    /// Start a job and return its id without waiting for it.
    pub async fn trigger(&self, as_of_utc: Option<DateTime<Utc>>) -> Uuid {
        let (job_id, writer) = self.registry.create(as_of_utc).await;
        info!(job_id = %job_id, as_of = ?as_of_utc, "report job queued");
        let svc = self.clone();
        tokio::spawn(async move { svc.run_job(writer, as_of_utc).await });
        job_id
    }

    pub async fn status(&self, job_id: Uuid) -> Result<JobSnapshot, JobError> {
        self.registry.get(job_id).await
    }

    /// CSV bytes of a complete job. Never returns partial output.
    pub async fn fetch_output(&self, job_id: Uuid) -> Result<Vec<u8>, JobError> {
        let snap = self.registry.get(job_id).await?;
        match (snap.status, snap.output_location) {
            (JobStatus::Complete, Some(location)) => {
                let sink = self.sink.clone();
                tokio::task::spawn_blocking(move || sink.read(&location))
                    .await
                    .map_err(|e| JobError::OutputUnavailable {
                        job_id,
                        error: e.to_string(),
                    })?
                    .map_err(|e| JobError::OutputUnavailable {
                        job_id,
                        error: format!("{e:#}"),
                    })
            }
            (JobStatus::Failed, _) => Err(JobError::Failed {
                job_id,
                error: snap.error.unwrap_or_default(),
            }),
            (status, _) => Err(JobError::NotReady { job_id, status }),
        }
    }

    /// Wait until `job_id` is terminal, at most `timeout`. The job keeps
    /// running after a timeout.
    pub async fn wait(&self, job_id: Uuid, timeout: Duration) -> Result<JobSnapshot, JobError> {
        let mut rx = self.registry.subscribe(job_id).await?;
        let waited = tokio::time::timeout(timeout, async {
            rx.wait_for(|s| s.status.is_terminal())
                .await
                .map(|snap| snap.clone())
        })
        .await;
        match waited {
            Ok(Ok(snap)) => Ok(snap),
            // Sender gone: the writer's drop already recorded a terminal state.
            Ok(Err(_)) => self.registry.get(job_id).await,
            Err(_) => Err(JobError::Timeout { job_id }),
        }
    }

    pub async fn trigger_and_wait(
        &self,
        as_of_utc: Option<DateTime<Utc>>,
        timeout: Duration,
    ) -> Result<JobSnapshot, JobError> {
        let job_id = self.trigger(as_of_utc).await;
        self.wait(job_id, timeout).await
    }

    // -----------------------------------------------------------------------
    // Runner
    // -----------------------------------------------------------------------

    async fn run_job(self, writer: JobWriter, requested: Option<DateTime<Utc>>) {
        let job_id = writer.job_id();
        if let Err(e) = writer.start() {
            warn!(job_id = %job_id, error = %e, "report job could not start");
            return;
        }

        let outcome = self.execute(&writer, requested).await;
        let recorded = match outcome {
            Ok((location, reported, skipped)) => {
                info!(job_id = %job_id, location = %location, reported, skipped, "report job complete");
                writer.complete(location, reported, skipped)
            }
            Err(reason) => {
                warn!(job_id = %job_id, error = %reason, "report job failed");
                writer.fail(reason)
            }
        };
        if let Err(e) = recorded {
            warn!(job_id = %job_id, error = %e, "report job transition rejected");
        }
    }

    async fn execute(
        &self,
        writer: &JobWriter,
        requested: Option<DateTime<Utc>>,
    ) -> Result<(String, usize, usize), String> {
        let as_of = self.resolve_as_of(requested)?;
        writer.set_as_of(as_of);

        let table = self.assembler.run(as_of).await.map_err(|e| e.to_string())?;
        let (reported, skipped) = (table.rows.len(), table.skipped.len());

        let sink = self.sink.clone();
        let job_id = writer.job_id();
        let location = tokio::task::spawn_blocking(move || sink.persist(job_id, &table))
            .await
            .map_err(|e| format!("persist task failed: {e}"))?
            .map_err(|e| format!("{e:#}"))?;

        Ok((location, reported, skipped))
    }

    fn resolve_as_of(&self, requested: Option<DateTime<Utc>>) -> Result<DateTime<Utc>, String> {
        if let Some(t) = requested {
            return Ok(t);
        }
        match self.as_of_policy {
            AsOfPolicy::WallClock => Ok(Utc::now()),
            AsOfPolicy::LatestSample => self
                .assembler
                .sources()
                .samples
                .latest_timestamp()
                .map_err(|e| e.to_string())?
                .ok_or_else(|| "as_of_policy=latest_sample but no samples are loaded".to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sw_report::MemoryReportSink;
    use sw_schemas::RawSample;
    use sw_sources::{InMemoryStore, Sources};

    fn service(policy: AsOfPolicy) -> ReportService {
        let mut store = InMemoryStore::new();
        store.push_sample(RawSample::new("s1", "2023-01-24 23:30:00 UTC", "active"));
        store.push_sample(RawSample::new("s2", "2023-01-24 22:00:00 UTC", "inactive"));
        let assembler = ReportAssembler::new(Sources::from_shared(Arc::new(store)), chrono_tz::UTC, 2);
        ReportService::new(assembler, Arc::new(MemoryReportSink::new()), policy)
    }

    #[tokio::test]
    async fn latest_sample_policy_uses_data_time() {
        let svc = service(AsOfPolicy::LatestSample);
        let snap = svc
            .trigger_and_wait(None, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(snap.status, JobStatus::Complete);
        assert_eq!(
            snap.as_of_utc,
            Some("2023-01-24T23:30:00Z".parse().unwrap())
        );
        let csv = String::from_utf8(svc.fetch_output(snap.job_id).await.unwrap()).unwrap();
        // s1 active at the as-of instant: no uptime yet in the hour.
        assert!(csv.contains("\ns1,0,60,"));
    }

    #[tokio::test]
    async fn latest_sample_policy_without_data_fails_job() {
        let assembler = ReportAssembler::new(
            Sources::from_shared(Arc::new(InMemoryStore::new())),
            chrono_tz::UTC,
            1,
        );
        let svc = ReportService::new(assembler, Arc::new(MemoryReportSink::new()), AsOfPolicy::LatestSample);
        let snap = svc
            .trigger_and_wait(None, Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert!(snap.error.unwrap().contains("no samples"));
        assert!(matches!(
            svc.fetch_output(snap.job_id).await,
            Err(JobError::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn explicit_as_of_wins_over_policy() {
        let svc = service(AsOfPolicy::WallClock);
        let as_of: DateTime<Utc> = "2023-01-25T00:00:00Z".parse().unwrap();
        let snap = svc
            .trigger_and_wait(Some(as_of), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(snap.as_of_utc, Some(as_of));
        assert_eq!(snap.stores_reported, 2);
    }

    #[tokio::test]
    async fn unknown_job_is_not_found() {
        let svc = service(AsOfPolicy::WallClock);
        let id = Uuid::new_v4();
        assert_eq!(svc.status(id).await.unwrap_err(), JobError::NotFound { job_id: id });
        assert_eq!(
            svc.fetch_output(id).await.unwrap_err(),
            JobError::NotFound { job_id: id }
        );
        assert!(matches!(
            svc.wait(id, Duration::from_millis(10)).await,
            Err(JobError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn swapped_sources_share_the_registry() {
        let svc = service(AsOfPolicy::WallClock);
        let as_of: DateTime<Utc> = "2023-01-25T00:00:00Z".parse().unwrap();
        let first = svc
            .trigger_and_wait(Some(as_of), Duration::from_secs(10))
            .await
            .unwrap();

        let mut store = InMemoryStore::new();
        store.push_sample(RawSample::new("s9", "2023-01-24 23:00:00 UTC", "active"));
        let swapped = svc.with_sources(Sources::from_shared(Arc::new(store)));
        let second = swapped
            .trigger_and_wait(Some(as_of), Duration::from_secs(10))
            .await
            .unwrap();
        assert_eq!(second.stores_reported, 1);

        // Both jobs are visible from either handle.
        assert_eq!(svc.status(second.job_id).await.unwrap(), second);
        assert_eq!(swapped.status(first.job_id).await.unwrap(), first);
        let csv = String::from_utf8(svc.fetch_output(second.job_id).await.unwrap()).unwrap();
        assert!(csv.contains("\ns9,60,0,"));
    }
}
