//! Report job lifecycle for StoreWatch.
//!
//! [`ReportService`] triggers report jobs on background tasks, tracks each
//! one through `queued → running → {complete, failed}`, and serves finished
//! output. State is owned by the service instance; there is no global map.

pub mod error;
pub mod record;
pub mod registry;
pub mod service;

pub use error::JobError;
pub use record::{JobSnapshot, JobStatus};
pub use registry::{JobRegistry, JobWriter};
pub use service::ReportService;
