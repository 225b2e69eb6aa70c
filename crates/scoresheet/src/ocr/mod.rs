pub mod http;
pub mod render;

pub use http::HttpOcrClient;

use std::time::Instant;

use crate::error::OcrError;

/// External optical-recognition collaborator. Implementations are handed the
/// whole document plus a page index and are responsible for producing that
/// page's recognized text, however they obtain their input image.
///
/// `deadline` is the request deadline; implementations must give up (and stop
/// retrying) once it passes rather than letting an in-flight call overrun the
/// request, returning `OcrError::DeadlineExceeded`.
///
/// The production implementation is [`HttpOcrClient`]; tests substitute a
/// mock. Absence of an adapter (no credential configured) is modeled as
/// `Option<Arc<dyn OcrAdapter>>` at the pipeline level, not as runtime
/// checks inside the extraction logic.
pub trait OcrAdapter: Send + Sync {
    fn recognize_page(
        &self,
        document: &[u8],
        page_index: usize,
        deadline: Option<Instant>,
    ) -> Result<String, OcrError>;
}
