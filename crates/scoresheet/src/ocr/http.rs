//! HTTP client for the external OCR service.
//!
//! The service accepts a base64-encoded page image and returns recognized
//! text per page. Calls are blocking; transient failures (transport errors,
//! 5xx) are retried with exponential backoff, all of it bounded by the
//! request deadline. The caller bounds concurrency by issuing at most one
//! call per extraction worker.

use std::time::{Duration, Instant};

use base64::Engine as _;
use serde::Deserialize;

use crate::config::OcrConfig;
use crate::error::OcrError;

use super::{render, OcrAdapter};

pub struct HttpOcrClient {
    api_key: String,
    endpoint: String,
    dpi: u32,
    max_retries: u32,
    retry_base_delay: Duration,
    call_timeout: Duration,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Deserialize)]
struct OcrResponse {
    #[serde(rename = "ParsedResults", default)]
    parsed_results: Vec<ParsedResult>,
    #[serde(rename = "IsErroredOnProcessing", default)]
    is_errored_on_processing: bool,
    /// The service sends either a string or an array of strings here.
    #[serde(rename = "ErrorMessage", default)]
    error_message: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ParsedResult {
    #[serde(rename = "ParsedText", default)]
    parsed_text: String,
}

impl HttpOcrClient {
    /// Build a client from config. Returns `NoCredential` when no api key is
    /// configured; the pipeline maps that to a disabled OCR capability.
    pub fn from_config(config: &OcrConfig) -> Result<Self, OcrError> {
        let api_key = config.api_key.clone().ok_or(OcrError::NoCredential)?;

        let call_timeout = Duration::from_secs(config.timeout_secs);
        let client = reqwest::blocking::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| OcrError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            endpoint: config.endpoint.clone(),
            dpi: config.dpi,
            max_retries: config.max_retries,
            retry_base_delay: Duration::from_secs(config.retry_base_delay_secs),
            call_timeout,
            client,
        })
    }

    fn post_image(&self, image_png: &[u8], remaining: Option<Duration>) -> Result<String, OcrError> {
        let base64_image = format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(image_png)
        );

        let form = [
            ("apikey", self.api_key.as_str()),
            ("base64Image", base64_image.as_str()),
            // Preserve table structure and use the engine that handles
            // digits better.
            ("isTable", "true"),
            ("OCREngine", "2"),
            ("scale", "true"),
        ];

        let mut request = self.client.post(&self.endpoint).form(&form);
        // A single call never gets more time than the request has left.
        if let Some(remaining) = remaining {
            request = request.timeout(remaining.min(self.call_timeout));
        }
        let response = request.send().map_err(|e| OcrError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(OcrError::Status {
                status: status.as_u16(),
                body: response.text().unwrap_or_default(),
            });
        }

        let parsed: OcrResponse = response
            .json()
            .map_err(|e| OcrError::InvalidResponse(e.to_string()))?;

        if parsed.is_errored_on_processing {
            let message = parsed
                .error_message
                .map(|v| v.to_string())
                .unwrap_or_else(|| "unknown processing error".to_string());
            return Err(OcrError::Processing(message));
        }

        let mut text = String::new();
        for page in &parsed.parsed_results {
            text.push_str(&page.parsed_text);
            text.push('\n');
        }
        Ok(text)
    }

    fn recognize_with_retry(
        &self,
        image_png: &[u8],
        deadline: Option<Instant>,
    ) -> Result<String, OcrError> {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.retry_base_delay * (1u32 << (attempt - 1)); // 2s, 4s, 8s
                if deadline.is_some_and(|d| Instant::now() + delay >= d) {
                    log::warn!("Giving up OCR retries; request deadline is closer than the backoff");
                    return Err(OcrError::DeadlineExceeded);
                }
                log::warn!(
                    "Retrying OCR request (attempt {}/{}) after {:?}...",
                    attempt + 1,
                    self.max_retries + 1,
                    delay
                );
                std::thread::sleep(delay);
            }

            let remaining = match deadline {
                Some(d) => {
                    let now = Instant::now();
                    if now >= d {
                        return Err(OcrError::DeadlineExceeded);
                    }
                    Some(d - now)
                }
                None => None,
            };

            match self.post_image(image_png, remaining) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    log::warn!("OCR request failed with retryable error: {}", e);
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            OcrError::Transport("OCR request failed after all retries".to_string())
        }))
    }
}

impl OcrAdapter for HttpOcrClient {
    fn recognize_page(
        &self,
        document: &[u8],
        page_index: usize,
        deadline: Option<Instant>,
    ) -> Result<String, OcrError> {
        let _span =
            tracing::info_span!("ocr.recognize_page", page = page_index, dpi = self.dpi).entered();
        let start = Instant::now();

        if deadline.is_some_and(|d| start >= d) {
            return Err(OcrError::DeadlineExceeded);
        }

        let image_png = render::page_to_png(document, page_index, self.dpi)?;
        let text = self.recognize_with_retry(&image_png, deadline)?;

        tracing::info!(
            page = page_index,
            elapsed_ms = %start.elapsed().as_millis(),
            text_len = text.len(),
            "OCR page recognized"
        );
        Ok(text)
    }
}
