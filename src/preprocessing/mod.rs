//! # Image Preprocessing Module
//!
//! Geometric correction of photographed reports before recognition.
//!
//! The module is organized into focused sub-modules:
//! - `deskewing`: Skew estimation from Hough lines and rotation correction
//! - `perspective`: Page outline detection and projective warp
//! - `thresholding`: Binary thresholding using Otsu's method
//! - `scaling`: Resizing to the working height
//! - `types`: Shared types and error definitions

pub mod deskewing;
pub mod perspective;
pub mod scaling;
pub mod thresholding;
pub mod types;

use image::{DynamicImage, GenericImageView};
use tracing;

pub use types::{
    Correction, PerspectiveConfig, PreprocessOutcome, PreprocessingError, Quad,
    ScaledImageResult, SkewEstimate, ThresholdedImageResult,
};

pub use deskewing::{estimate_skew, rotate_to_level};
pub use perspective::{find_page_quad, warp_page};
pub use scaling::resize_to_height;
pub use thresholding::apply_otsu_threshold;

use crate::errors::error_logging;
use crate::observability;

/// Skew detection and correction for one photographed page.
///
/// `correct` never fails: whenever estimation or correction is not possible
/// the input is passed through and the reason is reported in
/// [`PreprocessOutcome::degraded`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Preprocessor {
    config: PerspectiveConfig,
}

impl Preprocessor {
    pub fn new(config: PerspectiveConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PerspectiveConfig {
        &self.config
    }

    /// Levels the page if its skew exceeds the configured threshold.
    ///
    /// A perspective warp of the page outline is tried first, then a plain
    /// rotation by the negated skew.
    pub fn correct(&self, image: &DynamicImage) -> PreprocessOutcome {
        let start_time = std::time::Instant::now();

        if !self.config.auto_perspective {
            tracing::debug!(target: "inbody_preprocessing", "Perspective correction disabled");
            return self.finish(image.clone(), None, Correction::None, None, start_time);
        }

        let gray = image.to_luma8();
        let estimate = match estimate_skew(&gray) {
            Ok(estimate) => estimate,
            Err(e) => {
                error_logging::log_preprocessing_degraded(&e, None, image.dimensions());
                return self.finish(image.clone(), None, Correction::None, Some(e), start_time);
            }
        };

        let skew = estimate.angle_degrees;
        if skew.abs() <= self.config.skew_threshold {
            tracing::debug!(
                target: "inbody_preprocessing",
                skew_angle = skew,
                threshold = self.config.skew_threshold,
                "Skew within threshold, no correction"
            );
            return self.finish(image.clone(), Some(skew), Correction::None, None, start_time);
        }

        match find_page_quad(&gray).and_then(|quad| warp_page(image, &quad)) {
            Ok(warped) => {
                return self.finish(
                    warped,
                    Some(skew),
                    Correction::PerspectiveWarp,
                    None,
                    start_time,
                );
            }
            Err(e) => {
                tracing::debug!(
                    target: "inbody_preprocessing",
                    error = %e,
                    "Perspective warp unavailable, falling back to rotation"
                );
            }
        }

        let rotated = rotate_to_level(image, skew);
        if rotated.width() == 0 || rotated.height() == 0 {
            let e = PreprocessingError::ProcessingFailed {
                message: "rotation produced an empty image".to_string(),
            };
            error_logging::log_preprocessing_degraded(&e, Some(skew), image.dimensions());
            return self.finish(image.clone(), Some(skew), Correction::None, Some(e), start_time);
        }

        self.finish(
            rotated,
            Some(skew),
            Correction::Rotated {
                angle_degrees: -skew,
            },
            None,
            start_time,
        )
    }

    fn finish(
        &self,
        image: DynamicImage,
        skew_angle: Option<f32>,
        correction: Correction,
        degraded: Option<PreprocessingError>,
        start_time: std::time::Instant,
    ) -> PreprocessOutcome {
        let processing_time_ms = start_time.elapsed().as_millis() as u32;

        observability::record_preprocess_correction(correction.as_str(), degraded.is_some());

        tracing::debug!(
            target: "inbody_preprocessing",
            correction = correction.as_str(),
            skew_angle = ?skew_angle,
            degraded = degraded.is_some(),
            duration_ms = processing_time_ms,
            "Preprocessing finished"
        );

        PreprocessOutcome {
            image,
            skew_angle,
            correction,
            degraded,
            processing_time_ms,
        }
    }
}
