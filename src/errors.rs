//! # Extraction Error Types
//!
//! This module defines the error taxonomy used throughout the extraction engine.
//! Only configuration, image loading and recognition failures abort a call; the
//! remaining variants describe soft failures that are logged or downgraded to the
//! "not detected" sentinel by the field matcher.

use std::fmt;

/// Error type shared by every stage of the extraction pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum InBodyError {
    /// Invalid resolution, margins or field catalog
    Configuration(String),
    /// Skew or perspective could not be estimated; extraction continues uncorrected
    PreprocessingDegraded(String),
    /// The input image could not be read or decoded
    ImageLoad(String),
    /// The OCR backend failed or is unusable
    Recognition(String),
    /// No anchor or candidate survived for a field
    FieldNotDetected { field: String },
    /// The winning candidate could not be parsed into the field's value kind
    ValueParse { field: String, text: String },
}

impl InBodyError {
    /// Whether this error aborts the whole extraction call
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            InBodyError::Configuration(_) | InBodyError::ImageLoad(_) | InBodyError::Recognition(_)
        )
    }
}

impl fmt::Display for InBodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InBodyError::Configuration(msg) => write!(f, "[CONFIG] {}", msg),
            InBodyError::PreprocessingDegraded(msg) => write!(f, "[PREPROCESS] {}", msg),
            InBodyError::ImageLoad(msg) => write!(f, "[IMAGE_LOAD] {}", msg),
            InBodyError::Recognition(msg) => write!(f, "[OCR] {}", msg),
            InBodyError::FieldNotDetected { field } => {
                write!(f, "[FIELD] {} was not detected", field)
            }
            InBodyError::ValueParse { field, text } => {
                write!(f, "[PARSE] {}: cannot parse '{}'", field, text)
            }
        }
    }
}

impl std::error::Error for InBodyError {}

impl From<image::ImageError> for InBodyError {
    fn from(err: image::ImageError) -> Self {
        InBodyError::ImageLoad(err.to_string())
    }
}

impl From<serde_json::Error> for InBodyError {
    fn from(err: serde_json::Error) -> Self {
        InBodyError::Configuration(err.to_string())
    }
}

impl From<crate::preprocessing::PreprocessingError> for InBodyError {
    fn from(err: crate::preprocessing::PreprocessingError) -> Self {
        InBodyError::PreprocessingDegraded(err.to_string())
    }
}

/// Result type alias for convenience
pub type InBodyResult<T> = Result<T, InBodyError>;

/// Standardized error logging utilities for consistent error reporting
pub mod error_logging {
    use tracing::{error, warn};

    /// Log a fatal extraction failure with image context
    pub fn log_extraction_error(
        error: &impl std::fmt::Display,
        stage: &str,
        image: Option<&str>,
        processing_duration: Option<std::time::Duration>,
    ) {
        error!(
            error = %error,
            stage = %stage,
            image = ?image,
            processing_duration_ms = ?processing_duration.map(|d| d.as_millis()),
            "Extraction failed"
        );
    }

    /// Log a field that fell back to the sentinel
    pub fn log_field_failure(error: &impl std::fmt::Display, field: &str, keyword: &str) {
        warn!(
            error = %error,
            field = %field,
            keyword = %keyword,
            "Field not detected"
        );
    }

    /// Log a preprocessing step that could not be applied
    pub fn log_preprocessing_degraded(
        error: &impl std::fmt::Display,
        skew_angle: Option<f32>,
        image_size: (u32, u32),
    ) {
        warn!(
            error = %error,
            skew_angle = ?skew_angle,
            width = image_size.0,
            height = image_size.1,
            "Preprocessing degraded, continuing with uncorrected image"
        );
    }

    /// Log configuration errors during startup/initialization
    pub fn log_config_error(error: &impl std::fmt::Display, config_key: &str, operation: &str) {
        error!(
            error = %error,
            config_key = %config_key,
            operation = %operation,
            "Configuration error"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(InBodyError::Configuration("x".into()).is_fatal());
        assert!(InBodyError::Recognition("x".into()).is_fatal());
        assert!(InBodyError::ImageLoad("x".into()).is_fatal());
        assert!(!InBodyError::PreprocessingDegraded("x".into()).is_fatal());
        assert!(!InBodyError::FieldNotDetected { field: "weight".into() }.is_fatal());
        assert!(!InBodyError::ValueParse {
            field: "weight".into(),
            text: "abc".into()
        }
        .is_fatal());
    }

    #[test]
    fn test_display_tags() {
        let err = InBodyError::Configuration("target height must be positive".into());
        assert_eq!(err.to_string(), "[CONFIG] target height must be positive");

        let err = InBodyError::ValueParse {
            field: "weight".into(),
            text: "7?.4".into(),
        };
        assert_eq!(err.to_string(), "[PARSE] weight: cannot parse '7?.4'");
    }
}
