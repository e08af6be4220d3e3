//! sw-sources
//!
//! Collaborator contracts for raw store data (status polls, business hours,
//! timezones, store registry), an in-memory implementation, and CSV ingestion
//! of the raw datasets.
//!
//! This crate does **not** apply any defaulting policy; it hands raw rows to
//! `sw-calendar` and `sw-uptime`.

pub mod ingest_csv;
pub mod memory;
pub mod source;

pub use memory::InMemoryStore;
pub use source::*;
