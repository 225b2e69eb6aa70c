//! PDF page rasterisation via pdftoppm (poppler-utils).
//!
//! The OCR service wants a page image, not a PDF. Rendering shells out to
//! pdftoppm, which handles more PDF variants than any pure-Rust renderer we
//! could carry.

use std::process::Command;

use crate::error::OcrError;

/// Render one page (0-based index) of a PDF to PNG bytes at the given DPI.
pub fn page_to_png(pdf_bytes: &[u8], page_index: usize, dpi: u32) -> Result<Vec<u8>, OcrError> {
    let page_num = page_index + 1; // pdftoppm counts from 1

    let temp_dir = std::env::temp_dir();
    let pdf_path = temp_dir.join(format!("scoresheet_ocr_{}.pdf", uuid::Uuid::new_v4()));
    let output_prefix = temp_dir.join(format!("scoresheet_page_{}", uuid::Uuid::new_v4()));

    std::fs::write(&pdf_path, pdf_bytes).map_err(|e| OcrError::PageRender {
        page: page_index,
        reason: format!("Failed to write temp PDF: {}", e),
    })?;

    let output = Command::new("pdftoppm")
        .args([
            "-png",
            "-r",
            &dpi.to_string(),
            "-f",
            &page_num.to_string(),
            "-l",
            &page_num.to_string(),
            pdf_path.to_str().unwrap_or_default(),
            output_prefix.to_str().unwrap_or_default(),
        ])
        .output();

    let _ = std::fs::remove_file(&pdf_path);

    let output = output.map_err(|e| OcrError::PageRender {
        page: page_index,
        reason: format!(
            "Failed to run pdftoppm: {}. Make sure poppler-utils is installed.",
            e
        ),
    })?;

    if !output.status.success() {
        return Err(OcrError::PageRender {
            page: page_index,
            reason: format!("pdftoppm failed: {}", String::from_utf8_lossy(&output.stderr)),
        });
    }

    // pdftoppm pads the page-number suffix depending on the page count.
    let candidates = [
        format!("{}-{}.png", output_prefix.display(), page_num),
        format!("{}-{:02}.png", output_prefix.display(), page_num),
        format!("{}-{:03}.png", output_prefix.display(), page_num),
    ];
    let image_path = candidates
        .iter()
        .find(|p| std::path::Path::new(p).exists())
        .ok_or_else(|| OcrError::PageRender {
            page: page_index,
            reason: "Failed to find rendered page image".to_string(),
        })?;

    let image_data = std::fs::read(image_path).map_err(|e| OcrError::PageRender {
        page: page_index,
        reason: format!("Failed to read rendered image: {}", e),
    })?;

    let _ = std::fs::remove_file(image_path);

    Ok(image_data)
}
