//! Job bookkeeping.
//!
//! Each job's state lives in a `watch` channel. The registry keeps only the
//! receiving ends; the single [`JobWriter`] for a job owns the sender, so
//! every transition is one atomic `send_if_modified` and readers always see
//! a whole snapshot.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::{watch, RwLock};
use tracing::warn;
use uuid::Uuid;

use crate::error::JobError;
use crate::record::{JobSnapshot, JobStatus};

// ---------------------------------------------------------------------------
// JobRegistry
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct JobRegistry {
    jobs: RwLock<HashMap<Uuid, watch::Receiver<JobSnapshot>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new queued job and hand back its only writer.
    pub async fn create(&self, as_of_utc: Option<DateTime<Utc>>) -> (Uuid, JobWriter) {
        let job_id = Uuid::new_v4();
        let (tx, rx) = watch::channel(JobSnapshot::queued(job_id, as_of_utc));
        self.jobs.write().await.insert(job_id, rx);
        (job_id, JobWriter { job_id, tx })
    }

    pub async fn get(&self, job_id: Uuid) -> Result<JobSnapshot, JobError> {
        let jobs = self.jobs.read().await;
        let rx = jobs.get(&job_id).ok_or(JobError::NotFound { job_id })?;
        let snapshot = rx.borrow().clone();
        Ok(snapshot)
    }

    /// A fresh receiver for waiting on transitions.
    pub async fn subscribe(&self, job_id: Uuid) -> Result<watch::Receiver<JobSnapshot>, JobError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .cloned()
            .ok_or(JobError::NotFound { job_id })
    }

    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

// ---------------------------------------------------------------------------
// JobWriter
// ---------------------------------------------------------------------------

/// Sole mutator of one job's state. Not `Clone`.
///
/// Dropping a writer before the job is terminal marks it failed with
/// "runner exited", so a panicking runner never leaves a job stuck.
#[derive(Debug)]
pub struct JobWriter {
    job_id: Uuid,
    tx: watch::Sender<JobSnapshot>,
}

impl JobWriter {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn status(&self) -> JobStatus {
        self.tx.borrow().status
    }

    pub fn start(&self) -> Result<(), JobError> {
        self.transition(JobStatus::Running, |s| {
            s.started_at_utc = Some(Utc::now());
        })
    }

    /// Record the resolved as-of instant on a running job.
    pub fn set_as_of(&self, as_of_utc: DateTime<Utc>) {
        self.tx.send_modify(|s| s.as_of_utc = Some(as_of_utc));
    }

    pub fn complete(
        &self,
        output_location: String,
        stores_reported: usize,
        stores_skipped: usize,
    ) -> Result<(), JobError> {
        self.transition(JobStatus::Complete, |s| {
            s.output_location = Some(output_location);
            s.stores_reported = stores_reported;
            s.stores_skipped = stores_skipped;
            s.finished_at_utc = Some(Utc::now());
        })
    }

    pub fn fail(&self, error: impl Into<String>) -> Result<(), JobError> {
        let error = error.into();
        self.transition(JobStatus::Failed, |s| {
            s.error = Some(error);
            s.output_location = None;
            s.finished_at_utc = Some(Utc::now());
        })
    }

    fn transition<F>(&self, to: JobStatus, apply: F) -> Result<(), JobError>
    where
        F: FnOnce(&mut JobSnapshot),
    {
        let mut outcome = Ok(());
        self.tx.send_if_modified(|s| {
            if !s.status.can_transition_to(to) {
                outcome = Err(JobError::IllegalTransition {
                    job_id: self.job_id,
                    from: s.status,
                    to,
                });
                return false;
            }
            s.status = to;
            apply(s);
            true
        });
        outcome
    }
}

impl Drop for JobWriter {
    fn drop(&mut self) {
        let job_id = self.job_id;
        self.tx.send_if_modified(|s| {
            if s.status.is_terminal() {
                return false;
            }
            warn!(job_id = %job_id, status = %s.status, "job runner exited before finishing");
            s.status = JobStatus::Failed;
            s.error = Some("runner exited".to_string());
            s.output_location = None;
            s.finished_at_utc = Some(Utc::now());
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_registers_queued_job() {
        let reg = JobRegistry::new();
        let (id, writer) = reg.create(None).await;
        assert_eq!(writer.job_id(), id);
        let snap = reg.get(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Queued);
        assert!(snap.output_location.is_none());
        assert_eq!(reg.len().await, 1);
        // Keep the writer alive until the assertions are done.
        drop(writer);
    }

    #[tokio::test]
    async fn unknown_job_not_found() {
        let reg = JobRegistry::new();
        let id = Uuid::new_v4();
        assert_eq!(reg.get(id).await.unwrap_err(), JobError::NotFound { job_id: id });
        assert!(reg.subscribe(id).await.is_err());
    }

    #[tokio::test]
    async fn happy_path_transitions() {
        let reg = JobRegistry::new();
        let (id, w) = reg.create(None).await;
        w.start().unwrap();
        assert_eq!(reg.get(id).await.unwrap().status, JobStatus::Running);
        w.complete("reports/x.csv".to_string(), 3, 1).unwrap();
        let snap = reg.get(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Complete);
        assert_eq!(snap.output_location.as_deref(), Some("reports/x.csv"));
        assert_eq!((snap.stores_reported, snap.stores_skipped), (3, 1));
        assert!(snap.finished_at_utc.is_some());
    }

    #[tokio::test]
    async fn terminal_states_are_final() {
        let reg = JobRegistry::new();
        let (id, w) = reg.create(None).await;
        w.start().unwrap();
        w.fail("disk full").unwrap();

        let err = w.complete("late.csv".to_string(), 0, 0).unwrap_err();
        assert_eq!(
            err,
            JobError::IllegalTransition {
                job_id: id,
                from: JobStatus::Failed,
                to: JobStatus::Complete
            }
        );
        assert!(w.start().is_err());

        let snap = reg.get(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("disk full"));
        assert!(snap.output_location.is_none());
        drop(w);
        assert_eq!(reg.get(id).await.unwrap(), snap);
    }

    #[tokio::test]
    async fn queued_cannot_complete_directly() {
        let reg = JobRegistry::new();
        let (_, w) = reg.create(None).await;
        assert!(w.complete("x".to_string(), 0, 0).is_err());
        assert_eq!(w.status(), JobStatus::Queued);
    }

    #[tokio::test]
    async fn dropped_writer_marks_failed() {
        let reg = JobRegistry::new();
        let (id, w) = reg.create(None).await;
        w.start().unwrap();
        drop(w);
        let snap = reg.get(id).await.unwrap();
        assert_eq!(snap.status, JobStatus::Failed);
        assert_eq!(snap.error.as_deref(), Some("runner exited"));
    }

    #[tokio::test]
    async fn subscribers_see_terminal_state() {
        let reg = JobRegistry::new();
        let (id, w) = reg.create(None).await;
        let mut rx = reg.subscribe(id).await.unwrap();
        tokio::spawn(async move {
            w.start().unwrap();
            w.complete("done.csv".to_string(), 1, 0).unwrap();
        });
        let snap = rx
            .wait_for(|s| s.status.is_terminal())
            .await
            .unwrap()
            .clone();
        assert_eq!(snap.status, JobStatus::Complete);
    }
}
