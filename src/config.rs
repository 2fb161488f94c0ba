//! # Extraction Configuration
//!
//! Settings for one extraction engine instance: working resolution,
//! geometric correction, template revision, caller-side timeout and the
//! recognition backend. Loaded from environment variables or built in code,
//! and validated before the engine starts.

use crate::errors::{InBodyError, InBodyResult};
use crate::fields::CURRENT_TEMPLATE_REVISION;
use crate::ocr_config::OcrConfig;
use crate::preprocessing::scaling::MAX_TARGET_HEIGHT;
use crate::preprocessing::PerspectiveConfig;
use crate::scale::CANONICAL_HEIGHT;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Largest skew (degrees) accepted as a correction threshold
pub const MAX_SKEW_THRESHOLD: f32 = 45.0;

/// Configuration of the extraction engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Height (pixels) the page is resized to before recognition
    pub target_height: u32,
    /// Whether skew detection and correction run
    pub auto_perspective: bool,
    /// Skew magnitude (degrees) above which the page is corrected
    pub skew_threshold: f32,
    /// Report template revision; fields introduced later are skipped
    pub template_revision: u32,
    /// Per-image timeout applied by the batch runner, in seconds
    pub operation_timeout_secs: u64,
    /// Recognition backend settings
    pub ocr: OcrConfig,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            target_height: CANONICAL_HEIGHT,
            auto_perspective: true,
            skew_threshold: 15.0,
            template_revision: CURRENT_TEMPLATE_REVISION,
            operation_timeout_secs: 60,
            ocr: OcrConfig::default(),
        }
    }
}

/// Parses an optional variable, keeping `default` when it is unset.
fn parse_var<T: FromStr>(value: Option<String>, key: &str, default: T) -> InBodyResult<T> {
    match value {
        Some(raw) => raw.trim().parse().map_err(|_| {
            InBodyError::Configuration(format!("{} has an invalid value '{}'", key, raw))
        }),
        None => Ok(default),
    }
}

impl ExtractionConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> InBodyResult<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults; set but unparsable ones are
    /// configuration errors.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> InBodyResult<Self> {
        let mut config = Self::default();

        config.target_height = parse_var(
            lookup("INBODY_TARGET_HEIGHT"),
            "INBODY_TARGET_HEIGHT",
            config.target_height,
        )?;
        config.auto_perspective = match lookup("INBODY_AUTO_PERSPECTIVE") {
            Some(raw) => match raw.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => true,
                "false" | "0" | "no" | "off" => false,
                _ => {
                    return Err(InBodyError::Configuration(format!(
                        "INBODY_AUTO_PERSPECTIVE has an invalid value '{}'",
                        raw
                    )))
                }
            },
            None => config.auto_perspective,
        };
        config.skew_threshold = parse_var(
            lookup("INBODY_SKEW_THRESHOLD"),
            "INBODY_SKEW_THRESHOLD",
            config.skew_threshold,
        )?;
        config.template_revision = parse_var(
            lookup("INBODY_TEMPLATE_REVISION"),
            "INBODY_TEMPLATE_REVISION",
            config.template_revision,
        )?;
        config.operation_timeout_secs = parse_var(
            lookup("INBODY_TIMEOUT_SECS"),
            "INBODY_TIMEOUT_SECS",
            config.operation_timeout_secs,
        )?;

        if let Some(languages) = lookup("INBODY_OCR_LANGUAGES") {
            config.ocr.languages = languages;
        }
        config.ocr.tessdata_path = lookup("TESSDATA_PREFIX").filter(|p| !p.trim().is_empty());

        Ok(config)
    }

    /// Validate all configuration values
    pub fn validate(&self) -> InBodyResult<()> {
        if self.target_height == 0 || self.target_height > MAX_TARGET_HEIGHT {
            return Err(InBodyError::Configuration(format!(
                "target_height must be between 1 and {}, got {}",
                MAX_TARGET_HEIGHT, self.target_height
            )));
        }

        if !self.skew_threshold.is_finite()
            || !(0.0..=MAX_SKEW_THRESHOLD).contains(&self.skew_threshold)
        {
            return Err(InBodyError::Configuration(format!(
                "skew_threshold must be between 0 and {} degrees, got {}",
                MAX_SKEW_THRESHOLD, self.skew_threshold
            )));
        }

        if self.template_revision == 0 || self.template_revision > CURRENT_TEMPLATE_REVISION {
            return Err(InBodyError::Configuration(format!(
                "template_revision must be between 1 and {}, got {}",
                CURRENT_TEMPLATE_REVISION, self.template_revision
            )));
        }

        if self.operation_timeout_secs == 0 {
            return Err(InBodyError::Configuration(
                "operation_timeout_secs cannot be 0".to_string(),
            ));
        }

        self.ocr.validate()
    }

    /// Preprocessor settings derived from this configuration
    pub fn perspective(&self) -> PerspectiveConfig {
        PerspectiveConfig {
            auto_perspective: self.auto_perspective,
            skew_threshold: self.skew_threshold,
        }
    }

    /// Get a summary of the current configuration for logging
    pub fn summary(&self) -> String {
        format!(
            "Configuration: target_height={}, auto_perspective={}, skew_threshold={}, template_revision={}, timeout_secs={}, ocr_languages={}",
            self.target_height,
            self.auto_perspective,
            self.skew_threshold,
            self.template_revision,
            self.operation_timeout_secs,
            self.ocr.languages
        )
    }
}
