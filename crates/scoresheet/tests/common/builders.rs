//! Builders for creating test documents programmatically.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use scoresheet::error::OcrError;
use scoresheet::ocr::OcrAdapter;

/// One student row on a sheet: (register number, name, max marks, obtained).
pub type SheetRow<'a> = (&'a str, &'a str, &'a str, &'a str);

/// Renders the text of one score sheet page: a course header, a test-name
/// header and one line per student.
pub fn sheet_page(course_code: &str, course_name: &str, component: &str, rows: &[SheetRow]) -> String {
    let mut text = format!(
        "Course : {} - {}\nTest Name : {}\n",
        course_code, course_name, component
    );
    for (serial, (id, name, max, obtained)) in rows.iter().enumerate() {
        text.push_str(&format!(
            "{} {} {} {} {}\n",
            serial + 1,
            id,
            name,
            max,
            obtained
        ));
    }
    text
}

/// A continuation page: student rows with no headers of their own.
pub fn continuation_page(first_serial: usize, rows: &[SheetRow]) -> String {
    let mut text = String::new();
    for (offset, (id, name, max, obtained)) in rows.iter().enumerate() {
        text.push_str(&format!(
            "{} {} {} {} {}\n",
            first_serial + offset,
            id,
            name,
            max,
            obtained
        ));
    }
    text
}

/// Builds a minimal valid PDF with one text page per entry in `pages`.
/// An empty string produces a page without a content stream, which loads as
/// a textless page and forces the OCR fallback.
pub fn build_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.new_object_id();
    let resources_id = doc.new_object_id();

    doc.objects.insert(
        font_id,
        Object::Dictionary(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
        }),
    );
    doc.objects.insert(
        resources_id,
        Object::Dictionary(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        }),
    );

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let page_id = doc.new_object_id();

        let mut page_dict = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Resources" => resources_id,
        };

        if !text.is_empty() {
            let mut content = String::from("BT /F1 10 Tf 40 750 Td 14 TL\n");
            for line in text.lines() {
                let escaped = line.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)");
                content.push_str(&format!("({}) Tj T*\n", escaped));
            }
            content.push_str("ET");

            let content_id = doc.new_object_id();
            doc.objects.insert(
                content_id,
                Object::Stream(Stream::new(dictionary! {}, content.into_bytes())),
            );
            page_dict.set("Contents", content_id);
        }

        doc.objects.insert(page_id, Object::Dictionary(page_dict));
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// OCR adapter that returns a fixed text for every page and counts calls.
pub struct FixedOcr {
    text: String,
    calls: AtomicUsize,
}

impl FixedOcr {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrAdapter for FixedOcr {
    fn recognize_page(
        &self,
        _document: &[u8],
        _page_index: usize,
        _deadline: Option<Instant>,
    ) -> Result<String, OcrError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.text.clone())
    }
}

/// OCR adapter that always fails with a transport error.
pub struct BrokenOcr;

impl OcrAdapter for BrokenOcr {
    fn recognize_page(
        &self,
        _document: &[u8],
        _page_index: usize,
        _deadline: Option<Instant>,
    ) -> Result<String, OcrError> {
        Err(OcrError::Transport("connection refused".to_string()))
    }
}
