use lopdf::content::Content;
use lopdf::Object;

use crate::error::ScoresheetError;
use crate::record::{RawPage, TextSource};

/// Turns raw document bytes into an ordered sequence of page text blocks.
///
/// Fails with `DocumentUnreadable` only when the byte stream is not a valid
/// PDF or its page tree is empty. Individual blank pages are passed through
/// with empty text so the extraction engine can decide about OCR.
pub fn load_document(name: &str, bytes: &[u8]) -> Result<Vec<RawPage>, ScoresheetError> {
    let _span = tracing::info_span!("loader.load_document", document = %name).entered();

    let doc = lopdf::Document::load_mem(bytes).map_err(|e| ScoresheetError::DocumentUnreadable {
        name: name.to_string(),
        reason: format!("Failed to load PDF: {}", e),
    })?;

    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(ScoresheetError::DocumentUnreadable {
            name: name.to_string(),
            reason: "PDF has zero pages".to_string(),
        });
    }

    let mut raw_pages = Vec::with_capacity(pages.len());
    for (page_index, (_page_number, page_id)) in pages.iter().enumerate() {
        let text = page_text(&doc, *page_id);
        raw_pages.push(RawPage {
            page_index,
            text,
            source: TextSource::Native,
            confidence: 0.0,
        });
    }

    tracing::debug!(document = %name, pages = raw_pages.len(), "Loaded document");
    Ok(raw_pages)
}

/// Extracts one page's text with line structure intact.
///
/// Walks the content-stream text operators directly: show operators append
/// text, line-move operators (`Td`/`TD` with a vertical component, `T*`,
/// `'`, `"`, `Tm`, `ET`) emit a newline. Table parsing depends on one data
/// row per line, which run-concatenating extraction does not preserve.
/// Pages without a decodable content stream come back empty, never as an
/// error.
fn page_text(doc: &lopdf::Document, page_id: lopdf::ObjectId) -> String {
    let data = match doc.get_page_content(page_id) {
        Ok(data) => data,
        Err(_) => return String::new(),
    };
    let content = match Content::decode(&data) {
        Ok(content) => content,
        Err(_) => return String::new(),
    };

    let mut text = String::new();
    for op in &content.operations {
        match op.operator.as_str() {
            "Tj" => {
                if let Some(obj) = op.operands.first() {
                    push_text_object(&mut text, obj);
                }
            }
            "'" => {
                break_line(&mut text);
                if let Some(obj) = op.operands.first() {
                    push_text_object(&mut text, obj);
                }
            }
            "\"" => {
                break_line(&mut text);
                if let Some(obj) = op.operands.get(2) {
                    push_text_object(&mut text, obj);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = op.operands.first() {
                    for item in items {
                        match item {
                            Object::String(_, _) => push_text_object(&mut text, item),
                            // Large negative adjustments are inter-word gaps.
                            _ => {
                                if operand_number(item).is_some_and(|n| n < -150.0) {
                                    push_space(&mut text);
                                }
                            }
                        }
                    }
                }
            }
            "Td" | "TD" => {
                let dy = op.operands.get(1).and_then(operand_number).unwrap_or(0.0);
                if dy != 0.0 {
                    break_line(&mut text);
                } else {
                    push_space(&mut text);
                }
            }
            "T*" | "Tm" | "ET" => break_line(&mut text),
            _ => {}
        }
    }
    text
}

fn operand_number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(*r as f64),
        _ => None,
    }
}

fn push_text_object(text: &mut String, obj: &Object) {
    if let Object::String(bytes, _) = obj {
        text.push_str(&String::from_utf8_lossy(bytes));
    }
}

fn push_space(text: &mut String) {
    if text.chars().last().is_some_and(|c| !c.is_whitespace()) {
        text.push(' ');
    }
}

fn break_line(text: &mut String) {
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
}
