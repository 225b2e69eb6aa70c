use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info_span, warn};

use crate::aggregate::aggregate;
use crate::config::ReportConfig;
use crate::error::{ReportWarning, Result, ScoresheetError};
use crate::normalize::normalize;
use crate::ocr::{HttpOcrClient, OcrAdapter};
use crate::record::{AggregateTable, ReportRequest, SourceDocument};
use crate::report::{build_workbook, WorkbookSpec};
use crate::worker::{Job, JobResult, WorkerPool};

use super::context::ReportContext;

/// Everything a report request produces: the workbook spec for the renderer,
/// the tables behind it, and the full warning ledger.
#[derive(Debug)]
pub struct ReportOutput {
    pub workbook: WorkbookSpec,
    pub tables: Vec<AggregateTable>,
    pub warnings: Vec<ReportWarning>,
}

pub struct Pipeline {
    config: Arc<ReportConfig>,
    ocr: Option<Arc<dyn OcrAdapter>>,
}

impl Pipeline {
    /// Production constructor. OCR is a capability: with no credential
    /// configured the pipeline runs native-only and low-confidence pages are
    /// reported instead of recognized.
    pub fn from_config(config: Arc<ReportConfig>) -> Result<Self> {
        config.validate()?;

        let ocr: Option<Arc<dyn OcrAdapter>> = if config.ocr.api_key.is_some() {
            match HttpOcrClient::from_config(&config.ocr) {
                Ok(client) => Some(Arc::new(client)),
                Err(e) => {
                    warn!("OCR client unavailable, continuing native-only: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self { config, ocr })
    }

    /// Constructor with an explicit OCR adapter, used to inject fakes.
    pub fn with_ocr(config: Arc<ReportConfig>, ocr: Option<Arc<dyn OcrAdapter>>) -> Self {
        Self { config, ocr }
    }

    /// Run a full report request over a batch of documents.
    ///
    /// Fails only when no document yields a single valid record, or on a
    /// worker-infrastructure failure. Everything else degrades into warnings
    /// carried through to the workbook.
    pub fn generate(
        &self,
        documents: Vec<SourceDocument>,
        request: ReportRequest,
    ) -> Result<ReportOutput> {
        self.config.validate()?;

        let _span = info_span!("report.generate", documents = documents.len()).entered();
        let deadline = Instant::now() + Duration::from_secs(self.config.request_timeout_secs);

        let mut ctx = ReportContext::new(request, documents.len());

        {
            let _step = info_span!("extract").entered();
            self.step_extract(&mut ctx, documents, deadline)?;
        }

        {
            let _step = info_span!("normalize").entered();
            let (records, warnings) = normalize(std::mem::take(&mut ctx.drafts));
            ctx.records = records;
            ctx.warnings.extend(warnings);
        }

        if ctx.records.is_empty() {
            return Err(ScoresheetError::NoParsableContent);
        }

        {
            let _step = info_span!("aggregate").entered();
            let (tables, warnings) =
                aggregate(&ctx.records, &ctx.request, self.config.pass_threshold);
            ctx.tables = tables;
            ctx.warnings.extend(warnings);
        }

        let _step = info_span!("build_workbook").entered();
        let (workbook, warnings) =
            build_workbook(&ctx.tables, &ctx.warnings, chrono::Utc::now());
        ctx.warnings.extend(warnings);

        Ok(ReportOutput {
            workbook,
            tables: ctx.tables,
            warnings: ctx.warnings,
        })
    }

    /// Fan documents out over the worker pool and fold the results back in
    /// document-name order, so the draft stream does not depend on upload or
    /// completion order.
    fn step_extract(
        &self,
        ctx: &mut ReportContext,
        documents: Vec<SourceDocument>,
        deadline: Instant,
    ) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let worker_count = self.config.worker_count.min(documents.len()).max(1);
        let pool = WorkerPool::new(
            worker_count,
            self.config.confidence_threshold,
            self.ocr.clone(),
            Some(deadline),
        );

        let expected = documents.len();
        let mut pending: BTreeMap<String, usize> = BTreeMap::new();
        for document in &documents {
            *pending.entry(document.name.clone()).or_insert(0) += 1;
        }

        fn take_result(
            pending: &mut BTreeMap<String, usize>,
            results: &mut Vec<JobResult>,
            result: JobResult,
        ) {
            if let Some(count) = pending.get_mut(&result.document) {
                *count -= 1;
                if *count == 0 {
                    pending.remove(&result.document);
                }
            }
            results.push(result);
        }

        let mut results = Vec::with_capacity(expected);
        for document in documents {
            pool.submit(Job::new(document))?;
            // Drain finished results as we go so the bounded channels never
            // fill up behind a blocked submit.
            while let Some(result) = pool.try_recv_result() {
                take_result(&mut pending, &mut results, result);
            }
        }

        // Bounded by the request deadline: a worker that dies without sending
        // its result must not stall the whole report.
        while results.len() < expected {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match pool.recv_result_timeout(remaining) {
                Some(result) => take_result(&mut pending, &mut results, result),
                None => break,
            }
        }

        pool.shutdown();
        pool.wait();

        for (document, count) in pending {
            for _ in 0..count {
                warn!("Document '{}' produced no extraction result", document);
                ctx.warnings.push(ReportWarning::DocumentSkipped {
                    document: document.clone(),
                    reason: "extraction did not complete before the request deadline".to_string(),
                });
            }
        }

        results.sort_by(|a, b| a.document.cmp(&b.document));

        for result in results {
            match result.outcome {
                Ok(extraction) => {
                    ctx.drafts.extend(extraction.drafts);
                    ctx.warnings.extend(extraction.warnings);
                }
                Err(e) => {
                    warn!("Document '{}' skipped: {}", result.document, e);
                    ctx.warnings.push(ReportWarning::DocumentSkipped {
                        document: result.document,
                        reason: e.to_string(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ReportMode;
    use crate::testutil::build_pdf;

    fn pipeline() -> Pipeline {
        Pipeline::with_ocr(Arc::new(ReportConfig::default()), None)
    }

    fn overall() -> ReportRequest {
        ReportRequest {
            mode: ReportMode::Overall,
            roster: None,
        }
    }

    const MA_PAGE: &str = "\
Course : MA101 - Mathematics I
Test Name : FT1
1 RA2111003010001 ALICE JOHNSON 50 42
2 RA2111003010002 BOB SMITH 50 AB
3 RA2111003010003 CAROL WHITE 50 35";

    const PH_PAGE: &str = "\
Course : PH101 - Physics I
Test Name : FT1
1 RA2111003010001 ALICE JOHNSON 50 30
2 RA2111003010002 BOB SMITH 50 25";

    #[test]
    fn test_generate_overall_two_documents() {
        let documents = vec![
            SourceDocument::new("ma101_ft1.pdf", build_pdf(&[MA_PAGE])),
            SourceDocument::new("ph101_ft1.pdf", build_pdf(&[PH_PAGE])),
        ];

        let output = pipeline().generate(documents, overall()).unwrap();

        assert_eq!(output.tables.len(), 2);
        assert_eq!(output.tables[0].scope, "MA101");
        assert_eq!(output.tables[1].scope, "PH101");
        assert_eq!(output.workbook.sheets.len(), 2);
        assert_eq!(output.tables[0].rows.len(), 3);
        assert_eq!(output.tables[1].rows.len(), 2);
    }

    #[test]
    fn test_unreadable_document_degrades_to_warning() {
        let documents = vec![
            SourceDocument::new("good.pdf", build_pdf(&[MA_PAGE])),
            SourceDocument::new("bad.pdf", b"not a pdf".to_vec()),
        ];

        let output = pipeline().generate(documents, overall()).unwrap();

        assert_eq!(output.tables.len(), 1);
        assert!(output.warnings.iter().any(|w| matches!(
            w,
            ReportWarning::DocumentSkipped { document, .. } if document == "bad.pdf"
        )));
        assert!(output
            .workbook
            .warnings
            .iter()
            .any(|w| w.contains("bad.pdf")));
    }

    #[test]
    fn test_all_documents_unreadable_is_fatal() {
        let documents = vec![
            SourceDocument::new("a.pdf", b"junk".to_vec()),
            SourceDocument::new("b.pdf", b"junk".to_vec()),
        ];

        let result = pipeline().generate(documents, overall());
        assert!(matches!(result, Err(ScoresheetError::NoParsableContent)));
    }

    #[test]
    fn test_empty_batch_is_fatal() {
        let result = pipeline().generate(Vec::new(), overall());
        assert!(matches!(result, Err(ScoresheetError::NoParsableContent)));
    }

    #[test]
    fn test_output_independent_of_document_order() {
        let docs = || {
            vec![
                SourceDocument::new("ma101_ft1.pdf", build_pdf(&[MA_PAGE])),
                SourceDocument::new("ph101_ft1.pdf", build_pdf(&[PH_PAGE])),
            ]
        };
        let mut reversed = docs();
        reversed.reverse();

        let p = pipeline();
        let a = p.generate(docs(), overall()).unwrap();
        let b = p.generate(reversed, overall()).unwrap();

        assert_eq!(a.tables.len(), b.tables.len());
        for (x, y) in a.tables.iter().zip(&b.tables) {
            assert_eq!(x.scope, y.scope);
            assert_eq!(x.rows, y.rows);
        }
    }

    #[test]
    fn test_crashed_worker_degrades_to_skipped_document() {
        use crate::error::OcrError;
        use crate::ocr::OcrAdapter;

        struct CrashingOcr;

        impl OcrAdapter for CrashingOcr {
            fn recognize_page(
                &self,
                _document: &[u8],
                _page: usize,
                _deadline: Option<Instant>,
            ) -> std::result::Result<String, OcrError> {
                panic!("adapter crashed");
            }
        }

        // The textless document sends its worker through the OCR path, where
        // the adapter kills the thread before a result is sent. The report
        // must still come back within the request deadline, with the good
        // document intact.
        let config = ReportConfig {
            worker_count: 2,
            request_timeout_secs: 1,
            ..ReportConfig::default()
        };
        let p = Pipeline::with_ocr(Arc::new(config), Some(Arc::new(CrashingOcr)));

        let documents = vec![
            SourceDocument::new("good.pdf", build_pdf(&[MA_PAGE])),
            SourceDocument::new("scan.pdf", build_pdf(&[""])),
        ];
        let output = p.generate(documents, overall()).unwrap();

        assert_eq!(output.tables.len(), 1);
        assert_eq!(output.tables[0].scope, "MA101");
        assert!(output.warnings.iter().any(|w| matches!(
            w,
            ReportWarning::DocumentSkipped { document, .. } if document == "scan.pdf"
        )));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ReportConfig {
            confidence_threshold: 1.5,
            ..ReportConfig::default()
        };
        let result = Pipeline::with_ocr(Arc::new(config), None)
            .generate(vec![], overall());
        assert!(matches!(result, Err(ScoresheetError::Config(_))));
    }
}
