//! Turning page text into draft records.

pub mod confidence;
pub mod engine;
pub mod table;

pub use confidence::page_confidence;
pub use engine::{DocumentExtraction, ExtractionEngine};
pub use table::PageMeta;
