use crate::error::ScoresheetError;
use crate::extract::DocumentExtraction;
use crate::record::SourceDocument;

/// One document queued for extraction.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub document: SourceDocument,
}

impl Job {
    pub fn new(document: SourceDocument) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            document,
        }
    }
}

/// Outcome of one extraction job. `Err` means the whole document was
/// unreadable; partial pages come back as `Ok` with warnings inside.
#[derive(Debug)]
pub struct JobResult {
    pub job_id: String,
    pub document: String,
    pub outcome: Result<DocumentExtraction, ScoresheetError>,
}

impl JobResult {
    pub fn new(job: &Job, outcome: Result<DocumentExtraction, ScoresheetError>) -> Self {
        Self {
            job_id: job.id.clone(),
            document: job.document.name.clone(),
            outcome,
        }
    }
}
