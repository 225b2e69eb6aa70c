//! Validation and coercion of draft records into the canonical schema.
//!
//! Every transition produces either a record or an explicit warning; one bad
//! row never blocks the rest of the report.

pub mod correction;

use std::collections::BTreeMap;

use crate::error::ReportWarning;
use crate::record::{DraftRecord, ScoreRecord};

use correction::{correct_numeric, correct_student_id, is_absent_marker};

/// The default used when a sheet never states its test component.
const UNKNOWN_COMPONENT: &str = "Unknown Test";

/// Validate and deduplicate drafts. Returns canonical records (sorted by
/// (student, subject, component), so output is independent of input order)
/// plus warnings for every dropped or reconciled entry.
pub fn normalize(drafts: Vec<DraftRecord>) -> (Vec<ScoreRecord>, Vec<ReportWarning>) {
    let _span = tracing::info_span!("normalize", drafts = drafts.len()).entered();

    let mut warnings = Vec::new();
    let mut by_triple: BTreeMap<(String, String, String), ScoreRecord> = BTreeMap::new();

    for draft in drafts {
        let record = match coerce(draft, &mut warnings) {
            Some(record) => record,
            None => continue,
        };

        let triple = (
            record.student_id.clone(),
            record.subject_code.clone(),
            record.component.clone(),
        );

        match by_triple.get_mut(&triple) {
            None => {
                by_triple.insert(triple, record);
            }
            Some(existing) => {
                // Later page order wins; the loser is reported, never summed.
                let (winner_is_new, discarded) = if record.origin > existing.origin {
                    (true, existing.obtained_marks)
                } else {
                    (false, record.obtained_marks)
                };
                warnings.push(ReportWarning::DuplicateResolved {
                    student_id: triple.0.clone(),
                    subject_code: triple.1.clone(),
                    component: triple.2.clone(),
                    discarded,
                });
                if winner_is_new {
                    *existing = record;
                }
            }
        }
    }

    let records: Vec<ScoreRecord> = by_triple.into_values().collect();
    tracing::debug!(records = records.len(), warnings = warnings.len(), "Normalized");
    (records, warnings)
}

fn coerce(draft: DraftRecord, warnings: &mut Vec<ReportWarning>) -> Option<ScoreRecord> {
    let origin = draft.origin;
    let mut reject = |reason: String| {
        warnings.push(ReportWarning::SchemaViolation {
            origin: origin.to_string(),
            reason,
        });
        None::<ScoreRecord>
    };

    let Some(student_id) = draft.student_id.filter(|s| !s.trim().is_empty()) else {
        return reject("missing student identity".to_string());
    };
    let Some(subject_code) = draft.subject_code.filter(|s| !s.trim().is_empty()) else {
        return reject("missing subject code".to_string());
    };

    let student_id = correct_student_id(student_id.trim());
    let component = draft
        .component
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_COMPONENT.to_string());

    let Some(max_marks) = draft.max_marks.as_deref().and_then(correct_numeric) else {
        return reject(format!(
            "unparsable max marks {:?}",
            draft.max_marks.as_deref().unwrap_or("<missing>")
        ));
    };
    if max_marks <= 0.0 {
        return reject(format!("non-positive max marks {}", max_marks));
    }

    let raw_obtained = draft.obtained_marks.as_deref().unwrap_or("");
    let obtained_marks = if raw_obtained.trim().is_empty() || is_absent_marker(raw_obtained) {
        None
    } else {
        match correct_numeric(raw_obtained) {
            Some(v) => Some(v),
            None => {
                return reject(format!("unparsable obtained marks {:?}", raw_obtained));
            }
        }
    };

    if let Some(obtained) = obtained_marks {
        if obtained < 0.0 || obtained > max_marks {
            // Out-of-range marks are excluded, never clamped.
            return reject(format!(
                "obtained marks {} outside [0, {}]",
                obtained, max_marks
            ));
        }
    }

    let student_name = draft
        .student_name
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| student_id.clone());

    Some(ScoreRecord {
        attempted: obtained_marks.is_some(),
        student_id,
        student_name,
        subject_code: subject_code.trim().to_string(),
        component: component.trim().to_string(),
        max_marks,
        obtained_marks,
        origin,
    })
}
