use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Pages whose structural confidence falls below this trigger the OCR
    /// fallback (or a warning when OCR is unavailable). Default 0.55.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// A student passes when obtained/max reaches this fraction. Default 0.5.
    #[serde(default = "default_pass_threshold")]
    pub pass_threshold: f64,

    /// Number of parallel per-document extraction workers.
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Overall budget for one report request. Once exceeded, no further OCR
    /// calls are issued; affected pages keep their native text.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub ocr: OcrConfig,
}

fn default_confidence_threshold() -> f32 {
    0.55
}

fn default_pass_threshold() -> f64 {
    0.5
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_request_timeout_secs() -> u64 {
    120
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            pass_threshold: default_pass_threshold(),
            worker_count: default_worker_count(),
            request_timeout_secs: default_request_timeout_secs(),
            ocr: OcrConfig::default(),
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.confidence_threshold) {
            return Err(ConfigError::Validation {
                message: format!(
                    "confidence_threshold must be within [0, 1], got {}",
                    self.confidence_threshold
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.pass_threshold) {
            return Err(ConfigError::Validation {
                message: format!(
                    "pass_threshold must be within [0, 1], got {}",
                    self.pass_threshold
                ),
            });
        }
        if self.worker_count == 0 {
            return Err(ConfigError::Validation {
                message: "worker_count must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Credential for the OCR service. Absent means the OCR fallback is
    /// disabled and low-confidence pages are only warned about.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Rasterisation resolution for page images sent to the service.
    #[serde(default = "default_dpi")]
    pub dpi: u32,

    /// Retries for transient service failures, with exponential backoff.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_retry_base_delay_secs")]
    pub retry_base_delay_secs: u64,

    /// Per-call HTTP timeout.
    #[serde(default = "default_ocr_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_endpoint() -> String {
    "https://api.ocr.space/parse/image".to_string()
}

fn default_dpi() -> u32 {
    300
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_base_delay_secs() -> u64 {
    2
}

fn default_ocr_timeout_secs() -> u64 {
    30
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            endpoint: default_endpoint(),
            dpi: default_dpi(),
            max_retries: default_max_retries(),
            retry_base_delay_secs: default_retry_base_delay_secs(),
            timeout_secs: default_ocr_timeout_secs(),
        }
    }
}

pub fn load_config(path: &Path) -> Result<ReportConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<ReportConfig, ConfigError> {
    let config: ReportConfig = serde_json::from_str(content)?;
    config.validate()?;
    Ok(config)
}
