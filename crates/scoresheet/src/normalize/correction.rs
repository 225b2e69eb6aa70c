//! Restricted post-OCR correction for numeric fields.
//!
//! OCR engines confuse a small, well-known set of letters with digits. Only
//! that set is corrected; anything else stays unrecognized so the row is
//! dropped with a warning instead of silently fabricating a mark.

/// Letter/digit confusions the OCR engines in use actually produce.
const CONFUSIONS: &[(char, char)] = &[
    ('O', '0'),
    ('o', '0'),
    ('l', '1'),
    ('I', '1'),
    ('S', '5'),
    ('B', '8'),
    ('Z', '2'),
    ('g', '9'),
    (',', '.'),
];

fn map_char(c: char) -> Option<char> {
    if c.is_ascii_digit() || c == '.' {
        return Some(c);
    }
    CONFUSIONS
        .iter()
        .find(|(from, _)| *from == c)
        .map(|(_, to)| *to)
}

/// Parse a mark token, tolerating known OCR confusions. Returns `None` for
/// anything that is not a number even after correction.
pub fn correct_numeric(token: &str) -> Option<f64> {
    let token = token.trim().trim_end_matches('%');
    if token.is_empty() {
        return None;
    }

    // Fast path: already a plain number.
    if let Ok(v) = token.parse::<f64>() {
        return Some(v);
    }

    let corrected: Option<String> = token.chars().map(map_char).collect();
    corrected.and_then(|s| s.parse::<f64>().ok())
}

/// Correct OCR confusions in a student identifier. Ids carry an alphabetic
/// prefix (e.g. "RA...") followed by digits; only characters after the first
/// real digit are corrected, so the prefix survives untouched. Ids with no
/// digit at all are returned unchanged.
pub fn correct_student_id(id: &str) -> String {
    let Some(first_digit) = id.find(|c: char| c.is_ascii_digit()) else {
        return id.to_string();
    };

    let (prefix, tail) = id.split_at(first_digit);
    let corrected_tail: String = tail
        .chars()
        .map(|c| map_char(c).unwrap_or(c))
        .collect();

    format!("{}{}", prefix, corrected_tail)
}

/// Absentee markers used on the sheets.
pub fn is_absent_marker(token: &str) -> bool {
    matches!(token.trim(), "AB" | "Ab" | "ab" | "A" | "-" | "ABSENT" | "Absent" | "absent")
}
