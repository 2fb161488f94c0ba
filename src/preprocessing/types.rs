//! # Shared Types for Image Preprocessing
//!
//! This module contains the shared types, structs, and enums used across
//! the preprocessing sub-modules.

use image::{DynamicImage, GrayImage};
use serde::{Deserialize, Serialize};

/// Errors that can occur during image preprocessing operations.
#[derive(Debug, Clone, PartialEq)]
pub enum PreprocessingError {
    /// Invalid target height specified
    InvalidTargetHeight { height: u32 },
    /// Image processing operation failed
    ProcessingFailed { message: String },
    /// Not enough edge or contour features to estimate the document geometry
    InsufficientFeatures { found: usize, required: usize },
}

impl std::fmt::Display for PreprocessingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PreprocessingError::InvalidTargetHeight { height } => {
                write!(f, "Invalid target height: {}. Must be positive", height)
            }
            PreprocessingError::ProcessingFailed { message } => {
                write!(f, "Image processing failed: {}", message)
            }
            PreprocessingError::InsufficientFeatures { found, required } => {
                write!(
                    f,
                    "Too few geometric features: found {}, need at least {}",
                    found, required
                )
            }
        }
    }
}

impl std::error::Error for PreprocessingError {}

/// Perspective-correction settings supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerspectiveConfig {
    /// Whether skew detection and correction run at all
    pub auto_perspective: bool,
    /// Skew magnitude (degrees) above which the image is corrected
    pub skew_threshold: f32,
}

impl Default for PerspectiveConfig {
    fn default() -> Self {
        Self {
            auto_perspective: true,
            skew_threshold: 15.0,
        }
    }
}

/// Result of resizing an image to the working height.
#[derive(Debug, Clone)]
pub struct ScaledImageResult {
    /// The resized image
    pub image: DynamicImage,
    /// Original image dimensions (width, height)
    pub original_dimensions: (u32, u32),
    /// New image dimensions (width, height)
    pub new_dimensions: (u32, u32),
    /// Scale factor applied
    pub scale_factor: f32,
}

/// Result of image thresholding operation.
#[derive(Debug, Clone)]
pub struct ThresholdedImageResult {
    /// Binary image: ink is 0, paper is 255
    pub image: GrayImage,
    /// Optimal threshold value found by Otsu's method
    pub threshold: u8,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}

/// Dominant skew of the page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SkewEstimate {
    /// Detected skew angle in degrees; positive means rotated clockwise
    pub angle_degrees: f32,
    /// Number of straight lines that voted for the angle
    pub line_count: usize,
    /// Agreement between the voting lines (0.0-1.0)
    pub confidence: f32,
}

/// Four page corners in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub top_left: (f32, f32),
    pub top_right: (f32, f32),
    pub bottom_right: (f32, f32),
    pub bottom_left: (f32, f32),
}

impl Quad {
    /// Polygon area via the shoelace formula.
    pub fn area(&self) -> f32 {
        let pts = [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ];
        let mut twice_area = 0.0f32;
        for i in 0..pts.len() {
            let (x0, y0) = pts[i];
            let (x1, y1) = pts[(i + 1) % pts.len()];
            twice_area += x0 * y1 - x1 * y0;
        }
        twice_area.abs() / 2.0
    }

    pub fn as_array(&self) -> [(f32, f32); 4] {
        [
            self.top_left,
            self.top_right,
            self.bottom_right,
            self.bottom_left,
        ]
    }
}

/// Which correction the preprocessor applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Correction {
    /// Image passed through unchanged
    None,
    /// Image rotated by the negated skew angle
    Rotated { angle_degrees: f32 },
    /// Page quadrilateral warped onto an axis-aligned rectangle
    PerspectiveWarp,
}

impl Correction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Correction::None => "none",
            Correction::Rotated { .. } => "rotation",
            Correction::PerspectiveWarp => "perspective",
        }
    }
}

/// Output of the preprocessing stage.
#[derive(Debug, Clone)]
pub struct PreprocessOutcome {
    /// Corrected image, or a copy of the input
    pub image: DynamicImage,
    /// Estimated skew, if estimation ran and succeeded
    pub skew_angle: Option<f32>,
    pub correction: Correction,
    /// Set when estimation or correction failed and the input was passed through
    pub degraded: Option<PreprocessingError>,
    /// Processing time in milliseconds
    pub processing_time_ms: u32,
}
