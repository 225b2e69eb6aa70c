use serde::{Deserialize, Serialize};

/// Where a page's text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextSource {
    Native,
    Ocr,
}

/// One page of extracted text. Produced by the loader with
/// `source = Native`, possibly replaced by the extraction engine with an
/// OCR-recovered version. Discarded after extraction.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub page_index: usize,
    pub text: String,
    pub source: TextSource,
    pub confidence: f32,
}

/// Identifies where a record was read from. Ordering is (document, page,
/// row), so duplicate resolution depends only on the recorded position,
/// never on the order documents happened to be ingested.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecordOrigin {
    pub document: String,
    pub page: usize,
    pub row: usize,
}

impl std::fmt::Display for RecordOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:p{}:r{}", self.document, self.page, self.row)
    }
}

/// A loosely-typed row as read off a page, before validation. Any field may
/// be missing or malformed; the normalizer decides what survives.
#[derive(Debug, Clone)]
pub struct DraftRecord {
    pub origin: RecordOrigin,
    pub source: TextSource,
    pub student_id: Option<String>,
    pub student_name: Option<String>,
    pub subject_code: Option<String>,
    pub component: Option<String>,
    pub max_marks: Option<String>,
    pub obtained_marks: Option<String>,
}

/// A validated, canonical score entry. Invariants (enforced by the
/// normalizer): `subject_code` is non-empty; if `obtained_marks` is present
/// then `0 <= obtained <= max_marks`; the (student_id, subject_code,
/// component) triple is unique within one request.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreRecord {
    pub student_id: String,
    pub student_name: String,
    pub subject_code: String,
    pub component: String,
    pub max_marks: f64,
    pub obtained_marks: Option<f64>,
    pub attempted: bool,
    pub origin: RecordOrigin,
}

impl ScoreRecord {
    /// Fraction of the maximum achieved, if the student attempted.
    pub fn ratio(&self) -> Option<f64> {
        match self.obtained_marks {
            Some(obtained) if self.max_marks > 0.0 => Some(obtained / self.max_marks),
            _ => None,
        }
    }
}

/// Caller-supplied routing data for FA mode: which subjects a teacher owns.
/// Owns no records itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeacherGroup {
    pub teacher_name: String,
    pub subject_codes: Vec<String>,
}

/// The requested aggregation view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ReportMode {
    /// One teacher's own subjects, grouped per student.
    #[serde(rename = "self")]
    SelfReport { teacher_name: String },
    /// Faculty-advisor view: subjects routed to owning teachers, grouped per
    /// test component.
    Fa {
        advisor_name: String,
        groups: Vec<TeacherGroup>,
    },
    /// Every subject observed across the uploaded documents.
    Overall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportRequest {
    #[serde(flatten)]
    pub mode: ReportMode,
    /// Expected student ids. When present, students missing from the
    /// extracted records appear as explicit zero-attempt rows.
    #[serde(default)]
    pub roster: Option<Vec<String>>,
}

/// One uploaded document: a name (used for deterministic ordering) and its
/// raw bytes.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
        }
    }
}

/// One statistic line in an aggregate table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    /// Grouping key this row describes (student id, or "teacher — subject").
    pub key: String,
    /// Display label (student name where known, otherwise the key).
    pub label: String,
    /// Raw values for charting, aligned with the table's `columns` when
    /// columns are present; ragged per-record ratios otherwise (FA mode).
    pub values: Vec<Option<f64>>,
    pub attempted: usize,
    pub expected: usize,
    /// Mean obtained/max ratio over attempted values.
    pub mean_ratio: f64,
    /// Fraction of attempted values at or above the pass threshold.
    pub pass_rate: f64,
}

/// The terminal artifact of the core: one table per sheet, consumed by the
/// report builder and, through it, the external renderer.
#[derive(Debug, Clone, Serialize)]
pub struct AggregateTable {
    pub mode: String,
    /// What this table spans: a subject code (overall), a test component
    /// (fa), or the teacher's name (self).
    pub scope: String,
    /// What each row represents ("student" or "teacher").
    pub grouping_key: String,
    /// Labels for the per-row value columns; empty when rows are ragged.
    pub columns: Vec<String>,
    pub rows: Vec<AggregateRow>,
    /// Human-readable warnings that apply to this table.
    pub warnings: Vec<String>,
}
