//! Structural confidence scoring for page text.
//!
//! A pure function of the text: no OCR collaborator, no configuration
//! lookups. The extraction engine compares the score against the configured
//! threshold to decide whether the OCR fallback is worth its cost.

/// Minimum characters before the whitespace-density signal is meaningful.
/// Very short pages are judged on row structure alone.
const MIN_CHARS_FOR_DENSITY: usize = 40;

/// Tokens a candidate data row must have: serial/id, name, max, obtained.
const MIN_ROW_TOKENS: usize = 4;

/// Structural signals collected from one page of text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageSignals {
    /// Non-header lines that look like candidate data rows.
    pub data_rows: usize,
    /// Candidate rows whose shape matches the expected column layout.
    pub well_formed_rows: usize,
    /// Mark fields (last two tokens of candidate rows) that parse as numbers.
    pub numeric_fields: usize,
    /// Total mark fields inspected.
    pub mark_fields: usize,
    pub non_ws_chars: usize,
    pub total_chars: usize,
}

/// Lines that describe the table rather than filling it.
fn is_header_line(line: &str) -> bool {
    let lower = line.to_lowercase();
    lower.contains("course")
        || lower.contains("test name")
        || lower.contains("s.no")
        || lower.contains("register")
        || lower.contains("student name")
        || lower.contains("faculty")
}

/// A mark token is a plain number or an explicit absentee marker.
fn is_mark_token(token: &str) -> bool {
    is_numeric_token(token) || matches!(token, "AB" | "ab" | "Ab" | "-")
}

fn is_numeric_token(token: &str) -> bool {
    !token.is_empty() && token.parse::<f64>().is_ok()
}

/// A token that plausibly is a student identifier: long, alphanumeric, and
/// mostly digits (OCR may have turned some digits into lookalike letters,
/// which the normalizer corrects later, so those count too).
pub(crate) fn looks_like_student_id(token: &str) -> bool {
    let digit_like = token
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, 'O' | 'l' | 'I' | 'S' | 'B' | 'Z' | 'g'))
        .count();
    token.len() >= 6 && token.chars().all(|c| c.is_ascii_alphanumeric()) && digit_like >= 4
}

pub fn collect_signals(text: &str) -> PageSignals {
    let mut signals = PageSignals::default();

    signals.total_chars = text.chars().count();
    signals.non_ws_chars = text.chars().filter(|c| !c.is_whitespace()).count();

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || is_header_line(line) {
            continue;
        }

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < MIN_ROW_TOKENS {
            continue;
        }
        signals.data_rows += 1;

        // The two trailing tokens are the mark columns (max, obtained).
        let marks = &tokens[tokens.len() - 2..];
        for token in marks {
            signals.mark_fields += 1;
            if is_numeric_token(token) {
                signals.numeric_fields += 1;
            }
        }

        let has_id = tokens.iter().any(|t| looks_like_student_id(t));
        let marks_ok = marks.iter().all(|t| is_mark_token(t));
        if has_id && marks_ok {
            signals.well_formed_rows += 1;
        }
    }

    signals
}

/// Combine the signals into a [0, 1] confidence score.
///
/// Weights favour row structure (the strongest indicator that table parsing
/// will succeed), then numeric mark content, then raw text density. A page
/// with no text at all scores 0.
pub fn score(signals: &PageSignals) -> f32 {
    if signals.total_chars == 0 {
        return 0.0;
    }

    let row_ratio = if signals.data_rows > 0 {
        signals.well_formed_rows as f32 / signals.data_rows as f32
    } else {
        0.0
    };

    let numeric_ratio = if signals.mark_fields > 0 {
        signals.numeric_fields as f32 / signals.mark_fields as f32
    } else {
        0.0
    };

    let density = if signals.total_chars >= MIN_CHARS_FOR_DENSITY {
        signals.non_ws_chars as f32 / signals.total_chars as f32
    } else {
        // Too little text to judge; treat density as neutral so a short but
        // well-formed page is not punished.
        0.5
    };

    0.5 * row_ratio + 0.3 * numeric_ratio + 0.2 * density
}

/// Convenience wrapper: collect and score in one step.
pub fn page_confidence(text: &str) -> f32 {
    score(&collect_signals(text))
}
