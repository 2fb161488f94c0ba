//! # Image Scaling Module
//!
//! Resizes the corrected page to the working height used for recognition and
//! all downstream geometry.

use image::{DynamicImage, GenericImageView};
use tracing;

use super::types::{PreprocessingError, ScaledImageResult};

/// Largest working height accepted; beyond this recognition time explodes.
pub const MAX_TARGET_HEIGHT: u32 = 10_000;

/// Resizes `image` so that its height equals `target_height`, keeping the
/// aspect ratio.
///
/// Catmull-Rom interpolation is used in both directions. An image that
/// already has the target height is returned as a copy.
///
/// # Examples
///
/// ```
/// use image::{DynamicImage, RgbImage};
/// use inbody_extract::preprocessing::scaling::resize_to_height;
///
/// let img = DynamicImage::ImageRgb8(RgbImage::new(300, 400));
/// let result = resize_to_height(&img, 200).unwrap();
/// assert_eq!(result.new_dimensions, (150, 200));
/// ```
///
/// # Errors
///
/// `PreprocessingError::InvalidTargetHeight` for a zero or oversized target,
/// `ProcessingFailed` for an empty image.
pub fn resize_to_height(
    image: &DynamicImage,
    target_height: u32,
) -> Result<ScaledImageResult, PreprocessingError> {
    if target_height == 0 || target_height > MAX_TARGET_HEIGHT {
        return Err(PreprocessingError::InvalidTargetHeight {
            height: target_height,
        });
    }

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "Cannot scale an empty image".to_string(),
        });
    }

    let scale_factor = target_height as f32 / height as f32;
    let new_width = ((width as f64 * target_height as f64) / height as f64)
        .round()
        .max(1.0) as u32;

    let scaled = if height == target_height {
        image.clone()
    } else {
        image.resize_exact(
            new_width,
            target_height,
            image::imageops::FilterType::CatmullRom,
        )
    };

    tracing::debug!(
        target: "inbody_preprocessing",
        "Scaled {}x{} -> {}x{} (factor {:.3})",
        width,
        height,
        scaled.width(),
        scaled.height(),
        scale_factor
    );

    Ok(ScaledImageResult {
        new_dimensions: scaled.dimensions(),
        image: scaled,
        original_dimensions: (width, height),
        scale_factor,
    })
}
