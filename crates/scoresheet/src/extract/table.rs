//! Positional table parsing over page text.
//!
//! The sheets this crate ingests follow a common layout: a header block with
//! `Course : <CODE> - <NAME>` and `Test Name : <COMPONENT>` lines, then one
//! row per student of the form `S.No <register no> <name...> <max> <obtained>`
//! with `AB` (or `-`) marking an absentee. Parsing is lenient: anything that
//! does not fit becomes a skipped line, never an error.

use regex::Regex;

use crate::record::{DraftRecord, RecordOrigin, TextSource};

use super::confidence::looks_like_student_id;

/// Page-level metadata carried across pages of the same document: a sheet's
/// header appears once even when its rows continue onto the next page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageMeta {
    pub subject_code: Option<String>,
    pub component: Option<String>,
}

impl PageMeta {
    /// Later pages inherit whatever the newer page does not override.
    fn merged_over(self, inherited: &PageMeta) -> PageMeta {
        PageMeta {
            subject_code: self.subject_code.or_else(|| inherited.subject_code.clone()),
            component: self.component.or_else(|| inherited.component.clone()),
        }
    }
}

fn parse_meta(text: &str) -> PageMeta {
    let course_re = Regex::new(r"(?im)^\s*course\s*[:|-]\s*(.+)$").unwrap();
    let test_re = Regex::new(r"(?im)^\s*test\s*name\s*[:|-]\s*(.+)$").unwrap();

    let subject_code = course_re.captures(text).map(|c| {
        let course = c[1].trim();
        // "21CSC209J - Data Structures" → code before the dash; bare course
        // strings fall back to their first word.
        match course.split_once('-') {
            Some((code, _)) => code.trim().to_string(),
            None => course
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    });

    let component = test_re
        .captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty());

    PageMeta {
        subject_code: subject_code.filter(|s| !s.is_empty()),
        component,
    }
}

fn is_header_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("course")
        || lower.contains("test name")
        || lower.contains("s.no")
        || lower.contains("register")
        || lower.contains("student name")
        || lower.contains("faculty")
}

/// A small serial number at the start of a row ("1", "2", ... "107").
fn is_serial_token(token: &str) -> bool {
    token.len() <= 4 && token.chars().all(|c| c.is_ascii_digit())
}

/// Parse one page of text into draft records.
///
/// Returns the drafts plus the metadata in effect after this page, which the
/// caller threads into the next page of the same document.
pub fn parse_page(
    text: &str,
    document: &str,
    page: usize,
    source: TextSource,
    inherited: &PageMeta,
) -> (Vec<DraftRecord>, PageMeta) {
    let meta = parse_meta(text).merged_over(inherited);

    let mut drafts = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || is_header_line(line) {
            continue;
        }

        let mut tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() >= 2 && is_serial_token(tokens[0]) && !looks_like_student_id(tokens[0]) {
            tokens.remove(0);
        }
        if tokens.len() < 3 {
            continue;
        }

        // First id-looking token anchors the row; marks are the two trailing
        // tokens, the name is everything in between.
        let Some(id_pos) = tokens.iter().position(|t| looks_like_student_id(t)) else {
            continue;
        };
        let marks_start = tokens.len() - 2;
        if marks_start <= id_pos {
            continue;
        }

        let student_id = tokens[id_pos].to_string();
        let name_tokens = &tokens[id_pos + 1..marks_start];
        let student_name = if name_tokens.is_empty() {
            None
        } else {
            Some(name_tokens.join(" "))
        };

        drafts.push(DraftRecord {
            origin: RecordOrigin {
                document: document.to_string(),
                page,
                row: drafts.len(),
            },
            source,
            student_id: Some(student_id),
            student_name,
            subject_code: meta.subject_code.clone(),
            component: meta.component.clone(),
            max_marks: Some(tokens[marks_start].to_string()),
            obtained_marks: Some(tokens[marks_start + 1].to_string()),
        });
    }

    (drafts, meta)
}
