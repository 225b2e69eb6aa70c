//! Shared test utilities for scoresheet integration tests.
//!
//! This module provides:
//! - a PDF builder for synthesizing score sheet documents in memory
//! - page-text builders matching the sheet layout the extractor expects
//! - a scripted OCR adapter for exercising the fallback path offline

pub mod builders;

pub use builders::*;
