//! # OCR Configuration Module
//!
//! This module defines configuration structures for the recognition step,
//! including input size limits and Tesseract parameters.

use serde::{Deserialize, Serialize};

use crate::errors::{InBodyError, InBodyResult};

// Constants for OCR configuration
pub const DEFAULT_LANGUAGES: &str = "kor+eng";
pub const FORMAT_DETECTION_BUFFER_SIZE: usize = 32;
pub const MIN_FORMAT_BYTES: usize = 8;
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024; // 20MB limit for report photos

/// Format-specific file size limits for different image formats
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatSizeLimits {
    /// PNG format limit (higher due to better compression)
    pub png_max: u64,
    /// JPEG format limit (phone photos of reports)
    pub jpeg_max: u64,
    /// BMP format limit (lower due to uncompressed nature)
    pub bmp_max: u64,
    /// TIFF format limit (scanner output)
    pub tiff_max: u64,
}

impl Default for FormatSizeLimits {
    fn default() -> Self {
        Self {
            png_max: 20 * 1024 * 1024,  // 20MB for PNG
            jpeg_max: 15 * 1024 * 1024, // 15MB for JPEG
            bmp_max: 10 * 1024 * 1024,  // 10MB for BMP
            tiff_max: 20 * 1024 * 1024, // 20MB for TIFF
        }
    }
}

impl FormatSizeLimits {
    /// Size limit for a detected format, `None` when the format is unsupported.
    pub fn limit_for(&self, format: image::ImageFormat) -> Option<u64> {
        match format {
            image::ImageFormat::Png => Some(self.png_max),
            image::ImageFormat::Jpeg => Some(self.jpeg_max),
            image::ImageFormat::Bmp => Some(self.bmp_max),
            image::ImageFormat::Tiff => Some(self.tiff_max),
            _ => None,
        }
    }

    /// Validate format size limits
    pub fn validate(&self) -> InBodyResult<()> {
        let limits = [
            ("png_max", self.png_max),
            ("jpeg_max", self.jpeg_max),
            ("bmp_max", self.bmp_max),
            ("tiff_max", self.tiff_max),
        ];
        for (name, value) in limits {
            if value == 0 {
                return Err(InBodyError::Configuration(format!(
                    "{} must be greater than 0",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Page Segmentation Mode for Tesseract OCR
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub enum PageSegMode {
    /// Fully automatic page segmentation
    Auto,
    /// Assume a single uniform block of text
    SingleBlock,
    /// Find as much text as possible in no particular order
    #[default]
    SparseText,
    /// Sparse text with OSD
    SparseTextOsd,
}

impl PageSegMode {
    /// Convert PSM mode to string value for Tesseract
    pub fn as_str(&self) -> &'static str {
        match self {
            PageSegMode::Auto => "3",
            PageSegMode::SingleBlock => "6",
            PageSegMode::SparseText => "11",
            PageSegMode::SparseTextOsd => "12",
        }
    }
}

/// Configuration structure for the recognition step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrConfig {
    /// OCR language codes (e.g., "kor+eng")
    pub languages: String,
    /// Directory holding the traineddata files; Tesseract's default when unset
    pub tessdata_path: Option<String>,
    /// Page segmentation mode; the report is a sparse layout of labels and numbers
    pub psm_mode: PageSegMode,
    /// Optional character whitelist passed to Tesseract
    pub character_whitelist: Option<String>,
    /// Buffer size for format detection in bytes
    pub buffer_size: usize,
    /// Minimum bytes required for format detection
    pub min_format_bytes: usize,
    /// Maximum allowed input size in bytes (general limit)
    pub max_file_size: u64,
    /// Format-specific size limits
    pub format_limits: FormatSizeLimits,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            languages: DEFAULT_LANGUAGES.to_string(),
            tessdata_path: None,
            psm_mode: PageSegMode::default(),
            character_whitelist: None,
            buffer_size: FORMAT_DETECTION_BUFFER_SIZE,
            min_format_bytes: MIN_FORMAT_BYTES,
            max_file_size: MAX_FILE_SIZE,
            format_limits: FormatSizeLimits::default(),
        }
    }
}

impl OcrConfig {
    /// Validate OCR configuration parameters
    pub fn validate(&self) -> InBodyResult<()> {
        // Validate languages string
        if self.languages.trim().is_empty() {
            return Err(InBodyError::Configuration(
                "languages cannot be empty".to_string(),
            ));
        }
        if self
            .languages
            .split('+')
            .any(|lang| lang.trim().is_empty())
        {
            return Err(InBodyError::Configuration(format!(
                "malformed language list '{}'",
                self.languages
            )));
        }

        // Validate buffer sizes
        if self.buffer_size == 0 {
            return Err(InBodyError::Configuration(
                "buffer_size must be greater than 0".to_string(),
            ));
        }
        if self.min_format_bytes == 0 {
            return Err(InBodyError::Configuration(
                "min_format_bytes must be greater than 0".to_string(),
            ));
        }
        if self.min_format_bytes > self.buffer_size {
            return Err(InBodyError::Configuration(format!(
                "min_format_bytes ({}) cannot exceed buffer_size ({})",
                self.min_format_bytes, self.buffer_size
            )));
        }

        if self.max_file_size == 0 {
            return Err(InBodyError::Configuration(
                "max_file_size must be greater than 0".to_string(),
            ));
        }

        if let Some(whitelist) = &self.character_whitelist {
            if whitelist.is_empty() {
                return Err(InBodyError::Configuration(
                    "character_whitelist must not be empty when set".to_string(),
                ));
            }
        }

        self.format_limits.validate()?;

        Ok(())
    }
}
