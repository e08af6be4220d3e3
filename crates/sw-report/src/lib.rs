//! Report assembly and output for StoreWatch.
//!
//! [`ReportAssembler`] estimates every registered store on a bounded pool and
//! produces a [`ReportTable`]; a [`ReportSink`] persists the table and serves
//! its bytes back.

pub mod assembler;
pub mod sink;
pub mod table;

pub use assembler::{AssembleError, ReportAssembler};
pub use sink::{FsReportSink, MemoryReportSink, ReportManifest, ReportSink};
pub use table::{ReportTable, SkippedStore, StoreOutcome};
