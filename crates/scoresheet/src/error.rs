use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoresheetError {
    #[error("Document '{name}' is unreadable: {reason}")]
    DocumentUnreadable { name: String, reason: String },

    #[error("No parsable content found in any of the supplied documents")]
    NoParsableContent,

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("No OCR credential configured")]
    NoCredential,

    #[error("Failed to render page {page} to an image: {reason}")]
    PageRender { page: usize, reason: String },

    #[error("OCR service request failed: {0}")]
    Transport(String),

    #[error("OCR service rejected the request ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("OCR service failed to process the page: {0}")]
    Processing(String),

    #[error("OCR service returned an unparsable response: {0}")]
    InvalidResponse(String),

    #[error("Request deadline passed before OCR could finish")]
    DeadlineExceeded,
}

impl OcrError {
    /// Transport failures and server-side errors are worth retrying;
    /// everything else fails the same way on every attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            OcrError::Transport(_) => true,
            OcrError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to spawn worker: {0}")]
    SpawnFailed(String),

    #[error("Worker channel closed unexpectedly")]
    ChannelClosed,
}

/// Recoverable conditions recorded during a report request. These never abort
/// the pipeline; they are carried into the workbook's warnings area so the
/// degraded-output contract holds.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportWarning {
    /// A whole document failed to load; the rest of the batch was processed.
    DocumentSkipped { document: String, reason: String },

    /// Neither the native nor the OCR attempt reached the confidence
    /// threshold; the better of the two was kept.
    LowConfidencePage {
        document: String,
        page: usize,
        confidence: f32,
    },

    /// The OCR adapter failed for this page; native text was kept.
    OcrFailed {
        document: String,
        page: usize,
        reason: String,
    },

    /// OCR was wanted but no credential is configured.
    NoCredentialForOcr { document: String, page: usize },

    /// The request deadline passed before this page's OCR call was issued.
    OcrDeadlineExceeded { document: String, page: usize },

    /// A page yielded zero parsable rows.
    EmptyPage { document: String, page: usize },

    /// A draft row was dropped during normalization.
    SchemaViolation { origin: String, reason: String },

    /// A duplicate (student, subject, component) triple was resolved in
    /// favour of the later-page-order record; `discarded` is the losing value.
    DuplicateResolved {
        student_id: String,
        subject_code: String,
        component: String,
        discarded: Option<f64>,
    },

    /// An FA-mode record's subject is not owned by any supplied teacher group.
    UnroutedSubject { subject_code: String },

    /// An aggregate table had no rows; a placeholder sheet was emitted.
    EmptySheet { sheet: String },
}

impl std::fmt::Display for ReportWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportWarning::DocumentSkipped { document, reason } => {
                write!(f, "document '{}' skipped: {}", document, reason)
            }
            ReportWarning::LowConfidencePage {
                document,
                page,
                confidence,
            } => write!(
                f,
                "page {} of '{}' is low confidence ({:.2})",
                page, document, confidence
            ),
            ReportWarning::OcrFailed {
                document,
                page,
                reason,
            } => write!(
                f,
                "OCR failed for page {} of '{}': {}",
                page, document, reason
            ),
            ReportWarning::NoCredentialForOcr { document, page } => write!(
                f,
                "page {} of '{}' needs OCR but no credential is configured",
                page, document
            ),
            ReportWarning::OcrDeadlineExceeded { document, page } => write!(
                f,
                "request deadline passed before OCR of page {} of '{}'",
                page, document
            ),
            ReportWarning::EmptyPage { document, page } => {
                write!(f, "page {} of '{}' yielded no rows", page, document)
            }
            ReportWarning::SchemaViolation { origin, reason } => {
                write!(f, "row dropped ({}): {}", origin, reason)
            }
            ReportWarning::DuplicateResolved {
                student_id,
                subject_code,
                component,
                discarded,
            } => match discarded {
                Some(v) => write!(
                    f,
                    "duplicate entry for {}/{}/{}: discarded earlier value {}",
                    student_id, subject_code, component, v
                ),
                None => write!(
                    f,
                    "duplicate entry for {}/{}/{}: discarded earlier absent entry",
                    student_id, subject_code, component
                ),
            },
            ReportWarning::UnroutedSubject { subject_code } => {
                write!(f, "subject '{}' is not owned by any teacher group", subject_code)
            }
            ReportWarning::EmptySheet { sheet } => {
                write!(f, "sheet '{}' has no data; placeholder emitted", sheet)
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, ScoresheetError>;
