use crate::error::ReportWarning;
use crate::record::{AggregateTable, DraftRecord, ReportRequest, ScoreRecord};

/// Accumulates the intermediate results of one report request as the runner
/// moves through its steps.
pub struct ReportContext {
    pub request: ReportRequest,
    /// Number of documents submitted.
    pub document_count: usize,

    // Step 1 result
    pub drafts: Vec<DraftRecord>,

    // Step 2 result
    pub records: Vec<ScoreRecord>,

    // Step 3 result
    pub tables: Vec<AggregateTable>,

    // Non-fatal warnings from every step
    pub warnings: Vec<ReportWarning>,
}

impl ReportContext {
    pub fn new(request: ReportRequest, document_count: usize) -> Self {
        Self {
            request,
            document_count,
            drafts: Vec::new(),
            records: Vec::new(),
            tables: Vec::new(),
            warnings: Vec::new(),
        }
    }
}
