//! Grouping validated records into per-sheet aggregate tables.
//!
//! All grouping goes through `BTreeMap`, so table and row order depend only
//! on the data, never on ingestion order. Input records arrive deduplicated
//! and sorted from the normalizer.

use std::collections::{BTreeMap, BTreeSet};

use tracing::info_span;

use crate::error::ReportWarning;
use crate::record::{
    AggregateRow, AggregateTable, ReportMode, ReportRequest, ScoreRecord, TeacherGroup,
};

/// Build the aggregate tables for a request. Returns one table per output
/// sheet plus warnings for records the mode could not place.
pub fn aggregate(
    records: &[ScoreRecord],
    request: &ReportRequest,
    pass_threshold: f64,
) -> (Vec<AggregateTable>, Vec<ReportWarning>) {
    let _span = info_span!("aggregate", records = records.len()).entered();

    let roster = request.roster.as_deref();
    let (tables, warnings) = match &request.mode {
        ReportMode::SelfReport { teacher_name } => (
            vec![self_table(records, teacher_name, roster, pass_threshold)],
            Vec::new(),
        ),
        ReportMode::Overall => (overall_tables(records, roster, pass_threshold), Vec::new()),
        ReportMode::Fa { groups, .. } => fa_tables(records, groups, pass_threshold),
    };

    tracing::debug!(tables = tables.len(), "Aggregation complete");
    (tables, warnings)
}

/// attempted count, mean ratio over attempted, pass rate over attempted.
fn row_stats(values: &[Option<f64>], pass_threshold: f64) -> (usize, f64, f64) {
    let attempted: Vec<f64> = values.iter().flatten().copied().collect();
    if attempted.is_empty() {
        return (0, 0.0, 0.0);
    }
    let mean = attempted.iter().sum::<f64>() / attempted.len() as f64;
    let passed = attempted.iter().filter(|v| **v >= pass_threshold).count();
    (
        attempted.len(),
        mean,
        passed as f64 / attempted.len() as f64,
    )
}

fn student_names(records: &[ScoreRecord]) -> BTreeMap<&str, &str> {
    let mut names = BTreeMap::new();
    for record in records {
        names
            .entry(record.student_id.as_str())
            .or_insert(record.student_name.as_str());
    }
    names
}

fn student_row(
    student_id: &str,
    label: &str,
    values: Vec<Option<f64>>,
    expected: usize,
    pass_threshold: f64,
) -> AggregateRow {
    let (attempted, mean_ratio, pass_rate) = row_stats(&values, pass_threshold);
    AggregateRow {
        key: student_id.to_string(),
        label: label.to_string(),
        values,
        attempted,
        expected,
        mean_ratio,
        pass_rate,
    }
}

/// One table, one row per student, one column per subject. The cell is the
/// student's total obtained over total max across every component of that
/// subject.
fn self_table(
    records: &[ScoreRecord],
    teacher_name: &str,
    roster: Option<&[String]>,
    pass_threshold: f64,
) -> AggregateTable {
    let columns: Vec<String> = records
        .iter()
        .map(|r| r.subject_code.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    let names = student_names(records);

    // (student, subject) -> (sum obtained, sum max, attempted anything)
    let mut sums: BTreeMap<(&str, &str), (f64, f64, bool)> = BTreeMap::new();
    let mut students: BTreeSet<&str> = BTreeSet::new();
    for record in records {
        students.insert(&record.student_id);
        let entry = sums
            .entry((&record.student_id, &record.subject_code))
            .or_insert((0.0, 0.0, false));
        if let Some(obtained) = record.obtained_marks {
            entry.0 += obtained;
            entry.1 += record.max_marks;
            entry.2 = true;
        }
    }

    let mut roster_only: BTreeSet<&str> = BTreeSet::new();
    if let Some(roster) = roster {
        for id in roster {
            if !students.contains(id.as_str()) {
                roster_only.insert(id);
            }
        }
    }

    let mut rows = Vec::new();
    for &student in students.iter().chain(roster_only.iter()) {
        let values: Vec<Option<f64>> = columns
            .iter()
            .map(|subject| match sums.get(&(student, subject.as_str())) {
                Some((obtained, max, true)) if *max > 0.0 => Some(obtained / max),
                _ => None,
            })
            .collect();
        let label = names.get(student).copied().unwrap_or(student);
        rows.push(student_row(
            student,
            label,
            values,
            columns.len(),
            pass_threshold,
        ));
    }
    rows.sort_by(|a, b| a.key.cmp(&b.key));

    AggregateTable {
        mode: "self".to_string(),
        scope: teacher_name.to_string(),
        grouping_key: "student".to_string(),
        columns,
        rows,
        warnings: Vec::new(),
    }
}

/// One table per subject, one row per student, one column per test component.
fn overall_tables(
    records: &[ScoreRecord],
    roster: Option<&[String]>,
    pass_threshold: f64,
) -> Vec<AggregateTable> {
    let names = student_names(records);

    let mut by_subject: BTreeMap<&str, Vec<&ScoreRecord>> = BTreeMap::new();
    for record in records {
        by_subject
            .entry(&record.subject_code)
            .or_default()
            .push(record);
    }

    let mut tables = Vec::new();
    for (subject, subject_records) in by_subject {
        let columns: Vec<String> = subject_records
            .iter()
            .map(|r| r.component.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let mut cells: BTreeMap<&str, BTreeMap<&str, Option<f64>>> = BTreeMap::new();
        for record in &subject_records {
            cells
                .entry(&record.student_id)
                .or_default()
                .insert(&record.component, record.ratio());
        }
        if let Some(roster) = roster {
            for id in roster {
                cells.entry(id.as_str()).or_default();
            }
        }

        let rows = cells
            .into_iter()
            .map(|(student, by_component)| {
                let values: Vec<Option<f64>> = columns
                    .iter()
                    .map(|c| by_component.get(c.as_str()).copied().flatten())
                    .collect();
                let label = names.get(student).copied().unwrap_or(student);
                student_row(student, label, values, columns.len(), pass_threshold)
            })
            .collect();

        tables.push(AggregateTable {
            mode: "overall".to_string(),
            scope: subject.to_string(),
            grouping_key: "student".to_string(),
            columns,
            rows,
            warnings: Vec::new(),
        });
    }
    tables
}

/// Faculty-advisor view: one table per test component, one row per
/// (owning teacher, subject). Rows are ragged; `values` holds the per-student
/// ratios for that subject in student-id order.
fn fa_tables(
    records: &[ScoreRecord],
    groups: &[TeacherGroup],
    pass_threshold: f64,
) -> (Vec<AggregateTable>, Vec<ReportWarning>) {
    let mut owner_by_subject: BTreeMap<&str, &str> = BTreeMap::new();
    for group in groups {
        for subject in &group.subject_codes {
            owner_by_subject
                .entry(subject.as_str())
                .or_insert(group.teacher_name.as_str());
        }
    }

    let mut unrouted: BTreeSet<&str> = BTreeSet::new();
    // component -> (teacher, subject) -> student ratios
    let mut by_component: BTreeMap<&str, BTreeMap<(&str, &str), Vec<Option<f64>>>> =
        BTreeMap::new();

    for record in records {
        let Some(teacher) = owner_by_subject.get(record.subject_code.as_str()).copied() else {
            unrouted.insert(&record.subject_code);
            continue;
        };
        by_component
            .entry(&record.component)
            .or_default()
            .entry((teacher, record.subject_code.as_str()))
            .or_default()
            .push(record.ratio());
    }

    let warnings: Vec<ReportWarning> = unrouted
        .iter()
        .map(|subject| ReportWarning::UnroutedSubject {
            subject_code: subject.to_string(),
        })
        .collect();
    let warning_strings: Vec<String> = warnings.iter().map(|w| w.to_string()).collect();

    let tables = by_component
        .into_iter()
        .map(|(component, row_map)| {
            let rows = row_map
                .into_iter()
                .map(|((teacher, subject), values)| {
                    let (attempted, mean_ratio, pass_rate) = row_stats(&values, pass_threshold);
                    AggregateRow {
                        key: format!("{} — {}", teacher, subject),
                        label: format!("{} — {}", teacher, subject),
                        expected: values.len(),
                        values,
                        attempted,
                        mean_ratio,
                        pass_rate,
                    }
                })
                .collect();

            AggregateTable {
                mode: "fa".to_string(),
                scope: component.to_string(),
                grouping_key: "teacher".to_string(),
                columns: Vec::new(),
                rows,
                warnings: warning_strings.clone(),
            }
        })
        .collect();

    (tables, warnings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordOrigin;

    fn rec(
        student: &str,
        name: &str,
        subject: &str,
        component: &str,
        max: f64,
        obtained: Option<f64>,
    ) -> ScoreRecord {
        ScoreRecord {
            student_id: student.to_string(),
            student_name: name.to_string(),
            subject_code: subject.to_string(),
            component: component.to_string(),
            max_marks: max,
            obtained_marks: obtained,
            attempted: obtained.is_some(),
            origin: RecordOrigin {
                document: "d.pdf".into(),
                page: 0,
                row: 0,
            },
        }
    }

    fn overall(records: &[ScoreRecord]) -> Vec<AggregateTable> {
        let request = ReportRequest {
            mode: ReportMode::Overall,
            roster: None,
        };
        aggregate(records, &request, 0.5).0
    }

    #[test]
    fn test_overall_one_table_per_subject() {
        let records = vec![
            rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(42.0)),
            rec("RA001", "ALICE", "PH101", "FT1", 50.0, Some(33.0)),
            rec("RA002", "BOB", "MA101", "FT1", 50.0, Some(18.0)),
        ];
        let tables = overall(&records);

        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].scope, "MA101");
        assert_eq!(tables[1].scope, "PH101");
        assert_eq!(tables[0].rows.len(), 2);
        assert_eq!(tables[1].rows.len(), 1);
    }

    #[test]
    fn test_overall_columns_are_components() {
        let records = vec![
            rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(40.0)),
            rec("RA001", "ALICE", "MA101", "FT2", 50.0, Some(45.0)),
        ];
        let tables = overall(&records);

        assert_eq!(tables[0].columns, vec!["FT1", "FT2"]);
        assert_eq!(tables[0].rows[0].values, vec![Some(0.8), Some(0.9)]);
        assert_eq!(tables[0].rows[0].attempted, 2);
        assert_eq!(tables[0].rows[0].expected, 2);
    }

    #[test]
    fn test_absent_record_is_gap_in_stats() {
        let records = vec![
            rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(40.0)),
            rec("RA002", "BOB", "MA101", "FT1", 50.0, None),
        ];
        let tables = overall(&records);
        let bob = &tables[0].rows[1];

        assert_eq!(bob.values, vec![None]);
        assert_eq!(bob.attempted, 0);
        assert_eq!(bob.expected, 1);
        assert_eq!(bob.mean_ratio, 0.0);
        // Table mean only spans the attempted value.
        assert_eq!(tables[0].rows[0].mean_ratio, 0.8);
    }

    #[test]
    fn test_pass_rate_uses_threshold_over_attempted() {
        let records = vec![
            rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(40.0)),
            rec("RA001", "ALICE", "MA101", "FT2", 50.0, Some(10.0)),
        ];
        let tables = overall(&records);
        let row = &tables[0].rows[0];

        assert_eq!(row.pass_rate, 0.5); // 0.8 passes, 0.2 fails
        assert!((row.mean_ratio - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_roster_adds_zero_attempt_rows() {
        let records = vec![rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(40.0))];
        let request = ReportRequest {
            mode: ReportMode::Overall,
            roster: Some(vec!["RA001".into(), "RA002".into()]),
        };
        let (tables, _) = aggregate(&records, &request, 0.5);

        assert_eq!(tables[0].rows.len(), 2);
        let missing = &tables[0].rows[1];
        assert_eq!(missing.key, "RA002");
        assert_eq!(missing.values, vec![None]);
        assert_eq!(missing.attempted, 0);
        assert_eq!(missing.expected, 1);
    }

    #[test]
    fn test_self_mode_sums_components_per_subject() {
        let records = vec![
            rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(40.0)),
            rec("RA001", "ALICE", "MA101", "FT2", 50.0, Some(30.0)),
            rec("RA001", "ALICE", "PH101", "FT1", 50.0, Some(25.0)),
        ];
        let request = ReportRequest {
            mode: ReportMode::SelfReport {
                teacher_name: "Dr. Rao".into(),
            },
            roster: None,
        };
        let (tables, warnings) = aggregate(&records, &request, 0.5);

        assert!(warnings.is_empty());
        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.scope, "Dr. Rao");
        assert_eq!(table.grouping_key, "student");
        assert_eq!(table.columns, vec!["MA101", "PH101"]);
        // MA101: (40 + 30) / (50 + 50)
        assert_eq!(table.rows[0].values, vec![Some(0.7), Some(0.5)]);
    }

    #[test]
    fn test_self_mode_all_absent_subject_is_gap() {
        let records = vec![rec("RA001", "ALICE", "MA101", "FT1", 50.0, None)];
        let request = ReportRequest {
            mode: ReportMode::SelfReport {
                teacher_name: "Dr. Rao".into(),
            },
            roster: None,
        };
        let (tables, _) = aggregate(&records, &request, 0.5);
        assert_eq!(tables[0].rows[0].values, vec![None]);
    }

    #[test]
    fn test_fa_mode_one_table_per_component_rows_per_teacher_subject() {
        let records = vec![
            rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(40.0)),
            rec("RA002", "BOB", "MA101", "FT1", 50.0, Some(20.0)),
            rec("RA001", "ALICE", "PH101", "FT1", 50.0, Some(35.0)),
            rec("RA001", "ALICE", "MA101", "FT2", 50.0, Some(45.0)),
        ];
        let groups = vec![
            TeacherGroup {
                teacher_name: "Dr. Rao".into(),
                subject_codes: vec!["MA101".into()],
            },
            TeacherGroup {
                teacher_name: "Dr. Iyer".into(),
                subject_codes: vec!["PH101".into()],
            },
        ];
        let request = ReportRequest {
            mode: ReportMode::Fa {
                advisor_name: "Dr. Menon".into(),
                groups,
            },
            roster: None,
        };
        let (tables, warnings) = aggregate(&records, &request, 0.5);

        assert!(warnings.is_empty());
        assert_eq!(tables.len(), 2); // FT1, FT2
        let ft1 = &tables[0];
        assert_eq!(ft1.scope, "FT1");
        assert_eq!(ft1.grouping_key, "teacher");
        assert_eq!(ft1.rows.len(), 2);
        // Sorted by teacher name: Iyer before Rao.
        assert!(ft1.rows[0].key.starts_with("Dr. Iyer"));
        assert_eq!(ft1.rows[1].values, vec![Some(0.8), Some(0.4)]);
        assert_eq!(ft1.rows[1].pass_rate, 0.5);

        let ft2 = &tables[1];
        assert_eq!(ft2.scope, "FT2");
        assert_eq!(ft2.rows.len(), 1);
    }

    #[test]
    fn test_fa_mode_unrouted_subject_warns_once() {
        let records = vec![
            rec("RA001", "ALICE", "CH101", "FT1", 50.0, Some(40.0)),
            rec("RA002", "BOB", "CH101", "FT1", 50.0, Some(30.0)),
        ];
        let request = ReportRequest {
            mode: ReportMode::Fa {
                advisor_name: "Dr. Menon".into(),
                groups: vec![TeacherGroup {
                    teacher_name: "Dr. Rao".into(),
                    subject_codes: vec!["MA101".into()],
                }],
            },
            roster: None,
        };
        let (tables, warnings) = aggregate(&records, &request, 0.5);

        assert!(tables.is_empty());
        assert_eq!(warnings.len(), 1);
        assert!(matches!(
            &warnings[0],
            ReportWarning::UnroutedSubject { subject_code } if subject_code == "CH101"
        ));
    }

    #[test]
    fn test_aggregation_ignores_record_order() {
        let a = rec("RA001", "ALICE", "MA101", "FT1", 50.0, Some(40.0));
        let b = rec("RA002", "BOB", "MA101", "FT1", 50.0, Some(20.0));
        let c = rec("RA001", "ALICE", "PH101", "FT1", 50.0, Some(35.0));

        let forward = overall(&[a.clone(), b.clone(), c.clone()]);
        let shuffled = overall(&[c, a, b]);

        assert_eq!(forward.len(), shuffled.len());
        for (x, y) in forward.iter().zip(&shuffled) {
            assert_eq!(x.scope, y.scope);
            assert_eq!(x.rows, y.rows);
        }
    }
}
