//! Per-page extraction with OCR fallback.
//!
//! The central policy here is graceful degradation: a page is never a reason
//! to abort its document. When native text is not trustworthy the engine
//! asks the OCR adapter for a second opinion, keeps whichever attempt scores
//! higher, and records what happened as warnings instead of failing.

use std::time::Instant;

use tracing::info_span;

use crate::error::ReportWarning;
use crate::ocr::OcrAdapter;
use crate::record::{DraftRecord, RawPage, TextSource};

use super::confidence::page_confidence;
use super::table::{parse_page, PageMeta};

/// Everything extracted from one document.
#[derive(Debug)]
pub struct DocumentExtraction {
    pub document: String,
    pub drafts: Vec<DraftRecord>,
    /// Pages with their final source tag and confidence, kept for the
    /// degraded-output report.
    pub pages: Vec<RawPage>,
    pub warnings: Vec<ReportWarning>,
}

pub struct ExtractionEngine<'a> {
    confidence_threshold: f32,
    ocr: Option<&'a dyn OcrAdapter>,
    /// Request deadline; once passed, no further OCR calls are issued.
    deadline: Option<Instant>,
}

impl<'a> ExtractionEngine<'a> {
    pub fn new(
        confidence_threshold: f32,
        ocr: Option<&'a dyn OcrAdapter>,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            confidence_threshold,
            ocr,
            deadline,
        }
    }

    /// Extract draft records from every page of a document. Never fails;
    /// pages that defeat both extraction paths contribute warnings instead.
    pub fn extract_document(
        &self,
        document: &str,
        bytes: &[u8],
        pages: Vec<RawPage>,
    ) -> DocumentExtraction {
        let _span = info_span!("extract.document", document = %document).entered();

        let mut drafts = Vec::new();
        let mut warnings = Vec::new();
        let mut out_pages = Vec::with_capacity(pages.len());
        let mut meta = PageMeta::default();

        for page in pages {
            let resolved = self.resolve_page_text(document, bytes, page, &mut warnings);

            let (page_drafts, next_meta) = parse_page(
                &resolved.text,
                document,
                resolved.page_index,
                resolved.source,
                &meta,
            );
            meta = next_meta;

            if page_drafts.is_empty() {
                warnings.push(ReportWarning::EmptyPage {
                    document: document.to_string(),
                    page: resolved.page_index,
                });
            }
            drafts.extend(page_drafts);
            out_pages.push(resolved);
        }

        tracing::debug!(
            document = %document,
            drafts = drafts.len(),
            warnings = warnings.len(),
            "Document extracted"
        );

        DocumentExtraction {
            document: document.to_string(),
            drafts,
            pages: out_pages,
            warnings,
        }
    }

    /// Decide, for one page, which text to trust. Returns the page with its
    /// final text, source tag and confidence filled in.
    fn resolve_page_text(
        &self,
        document: &str,
        bytes: &[u8],
        mut page: RawPage,
        warnings: &mut Vec<ReportWarning>,
    ) -> RawPage {
        let native_confidence = page_confidence(&page.text);
        page.confidence = native_confidence;

        if native_confidence >= self.confidence_threshold {
            return page;
        }

        let low_confidence = |conf: f32| ReportWarning::LowConfidencePage {
            document: document.to_string(),
            page: page.page_index,
            confidence: conf,
        };

        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            warnings.push(ReportWarning::OcrDeadlineExceeded {
                document: document.to_string(),
                page: page.page_index,
            });
            warnings.push(low_confidence(native_confidence));
            return page;
        }

        let Some(ocr) = self.ocr else {
            warnings.push(ReportWarning::NoCredentialForOcr {
                document: document.to_string(),
                page: page.page_index,
            });
            warnings.push(low_confidence(native_confidence));
            return page;
        };

        let _span = info_span!(
            "extract.ocr_fallback",
            page = page.page_index,
            native_confidence
        )
        .entered();

        match ocr.recognize_page(bytes, page.page_index, self.deadline) {
            Ok(ocr_text) => {
                let ocr_confidence = page_confidence(&ocr_text);
                if ocr_confidence > native_confidence {
                    page.text = ocr_text;
                    page.source = TextSource::Ocr;
                    page.confidence = ocr_confidence;
                } else {
                    tracing::debug!(
                        page = page.page_index,
                        ocr_confidence,
                        native_confidence,
                        "OCR did not improve on native text; keeping native"
                    );
                }
                if page.confidence < self.confidence_threshold {
                    warnings.push(low_confidence(page.confidence));
                }
            }
            // The adapter gave up because the request ran out of time, not
            // because the page is bad.
            Err(crate::error::OcrError::DeadlineExceeded) => {
                warnings.push(ReportWarning::OcrDeadlineExceeded {
                    document: document.to_string(),
                    page: page.page_index,
                });
                warnings.push(low_confidence(native_confidence));
            }
            Err(e) => {
                warnings.push(ReportWarning::OcrFailed {
                    document: document.to_string(),
                    page: page.page_index,
                    reason: e.to_string(),
                });
                warnings.push(low_confidence(native_confidence));
            }
        }

        page
    }
}
