use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// JobStatus
// ---------------------------------------------------------------------------

/// `queued → running → {complete, failed}`. Terminal states never change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        matches!(
            (self, next),
            (JobStatus::Queued, JobStatus::Running)
                | (JobStatus::Running, JobStatus::Complete)
                | (JobStatus::Running, JobStatus::Failed)
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// JobSnapshot
// ---------------------------------------------------------------------------

/// Everything known about one job at one instant.
///
/// `output_location` is set iff `status == Complete`; `error` iff
/// `status == Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub status: JobStatus,
    /// Requested as-of, or the resolved one once the job is running.
    pub as_of_utc: Option<DateTime<Utc>>,
    pub created_at_utc: DateTime<Utc>,
    pub started_at_utc: Option<DateTime<Utc>>,
    pub finished_at_utc: Option<DateTime<Utc>>,
    pub output_location: Option<String>,
    pub error: Option<String>,
    pub stores_reported: usize,
    pub stores_skipped: usize,
}

impl JobSnapshot {
    pub fn queued(job_id: Uuid, as_of_utc: Option<DateTime<Utc>>) -> Self {
        Self {
            job_id,
            status: JobStatus::Queued,
            as_of_utc,
            created_at_utc: Utc::now(),
            started_at_utc: None,
            finished_at_utc: None,
            output_location: None,
            error: None,
            stores_reported: 0,
            stores_skipped: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legal_transitions_only() {
        use JobStatus::*;
        let all = [Queued, Running, Complete, Failed];
        let legal = [(Queued, Running), (Running, Complete), (Running, Failed)];
        for from in all {
            for to in all {
                assert_eq!(
                    from.can_transition_to(to),
                    legal.contains(&(from, to)),
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
    }

    #[test]
    fn snapshot_serializes_snake_case_status() {
        let s = JobSnapshot::queued(Uuid::new_v4(), None);
        let v = serde_json::to_value(&s).unwrap();
        assert_eq!(v["status"], "queued");
        assert!(v["output_location"].is_null());
    }
}
