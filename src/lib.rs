//! # InBody Report Extraction
//!
//! Reads body-composition values from photographed InBody reports. The page
//! is levelled, resized to a working height and recognized by an OCR
//! backend; each field is then located geometrically from its printed label,
//! with every layout constant scaled from the canonical 2400 px report.

pub mod batch;
pub mod config;
pub mod errors;
pub mod field_matcher;
pub mod fields;
pub mod matcher;
pub mod matching_params;
pub mod observability;
pub mod observability_config;
pub mod ocr;
pub mod ocr_config;
pub mod preprocessing;
pub mod scale;
pub mod table_locator;
pub mod text_matching;

// Re-export types for easier access
pub use config::ExtractionConfig;
pub use errors::{InBodyError, InBodyResult};
pub use field_matcher::{FieldValue, NOT_DETECTED};
pub use fields::{FieldCatalog, FieldDefinition};
pub use matcher::{ExtractionResult, InBodyMatcher};
pub use ocr::{BBox, Recognizer, TextNode};
pub use scale::ScaleManager;
