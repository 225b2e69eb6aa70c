//! Orchestration of a full report request.

pub mod context;
pub mod runner;

pub use context::ReportContext;
pub use runner::{Pipeline, ReportOutput};
