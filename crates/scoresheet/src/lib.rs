pub mod aggregate;
pub mod config;
pub mod error;
pub mod extract;
pub mod loader;
pub mod normalize;
pub mod ocr;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod telemetry;
pub mod worker;

#[cfg(test)]
mod testutil;

pub use aggregate::aggregate;
pub use config::{load_config, load_config_from_str, OcrConfig, ReportConfig};
pub use error::{
    ConfigError, OcrError, ReportWarning, Result, ScoresheetError, WorkerError,
};
pub use pipeline::{Pipeline, ReportOutput};
pub use record::{
    AggregateRow, AggregateTable, ReportMode, ReportRequest, ScoreRecord, SourceDocument,
    TeacherGroup, TextSource,
};
pub use report::{build_workbook, sanitize_sheet_name, WorkbookSpec};
