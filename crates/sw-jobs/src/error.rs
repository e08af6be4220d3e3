use std::fmt;

use uuid::Uuid;

use crate::record::JobStatus;

/// Caller-visible job conditions. Each maps to a distinct HTTP status in
/// the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    NotFound { job_id: Uuid },
    NotReady { job_id: Uuid, status: JobStatus },
    Failed { job_id: Uuid, error: String },
    Timeout { job_id: Uuid },
    IllegalTransition { job_id: Uuid, from: JobStatus, to: JobStatus },
    /// The job completed but its stored output could not be read back.
    OutputUnavailable { job_id: Uuid, error: String },
}

impl JobError {
    pub fn job_id(&self) -> Uuid {
        match self {
            JobError::NotFound { job_id }
            | JobError::NotReady { job_id, .. }
            | JobError::Failed { job_id, .. }
            | JobError::Timeout { job_id }
            | JobError::IllegalTransition { job_id, .. }
            | JobError::OutputUnavailable { job_id, .. } => *job_id,
        }
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobError::NotFound { job_id } => write!(f, "report job {job_id} not found"),
            JobError::NotReady { job_id, status } => {
                write!(f, "report job {job_id} not ready (status={status})")
            }
            JobError::Failed { job_id, error } => {
                write!(f, "report job {job_id} failed: {error}")
            }
            JobError::Timeout { job_id } => {
                write!(f, "timed out waiting for report job {job_id}")
            }
            JobError::IllegalTransition { job_id, from, to } => {
                write!(f, "report job {job_id}: illegal transition {from} -> {to}")
            }
            JobError::OutputUnavailable { job_id, error } => {
                write!(f, "report job {job_id} output unavailable: {error}")
            }
        }
    }
}

impl std::error::Error for JobError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_id_and_status() {
        let id = Uuid::nil();
        let e = JobError::NotReady {
            job_id: id,
            status: JobStatus::Running,
        };
        assert_eq!(
            e.to_string(),
            "report job 00000000-0000-0000-0000-000000000000 not ready (status=running)"
        );
        assert_eq!(e.job_id(), id);
    }
}
