//! # Image Thresholding Module
//!
//! Binary thresholding with Otsu's method. Used by the table locator to find
//! printed rules and by the perspective step to separate the page from its
//! background.

use image::GrayImage;
use tracing;

use super::types::{PreprocessingError, ThresholdedImageResult};

/// Applies Otsu's thresholding algorithm to a grayscale image.
///
/// Pixels brighter than the threshold become 255 (paper), the rest become 0
/// (ink or background).
///
/// # Errors
///
/// Returns `PreprocessingError::ProcessingFailed` for an empty image.
pub fn apply_otsu_threshold(gray: &GrayImage) -> Result<ThresholdedImageResult, PreprocessingError> {
    let start_time = std::time::Instant::now();

    if gray.width() == 0 || gray.height() == 0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: "Empty image for thresholding".to_string(),
        });
    }

    // Calculate histogram
    let mut histogram = [0u32; 256];
    let total_pixels = f64::from(gray.width()) * f64::from(gray.height());

    for pixel in gray.pixels() {
        histogram[pixel[0] as usize] += 1;
    }

    let optimal_threshold = find_otsu_threshold(&histogram, total_pixels);

    let mut binary_img = GrayImage::new(gray.width(), gray.height());
    for (x, y, pixel) in gray.enumerate_pixels() {
        let binary_value = if pixel[0] > optimal_threshold {
            255u8
        } else {
            0u8
        };
        binary_img.put_pixel(x, y, image::Luma([binary_value]));
    }

    let processing_time = start_time.elapsed();

    tracing::debug!(
        target: "inbody_preprocessing",
        "Otsu thresholding completed in {}ms: threshold={}, dimensions={}x{}",
        processing_time.as_millis(),
        optimal_threshold,
        gray.width(),
        gray.height()
    );

    Ok(ThresholdedImageResult {
        image: binary_img,
        threshold: optimal_threshold,
        processing_time_ms: processing_time.as_millis() as u32,
    })
}

/// Finds the threshold that maximizes between-class variance.
///
/// Falls back to 128 when the histogram holds a single intensity.
pub(crate) fn find_otsu_threshold(histogram: &[u32; 256], total_pixels: f64) -> u8 {
    let mut cumulative_sum = 0f64;
    let mut cumulative_weighted_sum = 0f64;

    let mut cumulative_sums = [0f64; 256];
    let mut cumulative_weighted_sums = [0f64; 256];

    for i in 0..256 {
        let pixel_count = f64::from(histogram[i]);
        cumulative_sum += pixel_count;
        cumulative_weighted_sum += (i as f64) * pixel_count;

        cumulative_sums[i] = cumulative_sum;
        cumulative_weighted_sums[i] = cumulative_weighted_sum;
    }

    let mut max_variance = 0f64;
    let mut optimal_threshold = 128u8;

    let total_weighted_sum = cumulative_weighted_sums[255];

    for threshold_idx in 1..255usize {
        // Background class: pixels <= threshold
        let w0 = cumulative_sums[threshold_idx] / total_pixels;
        let w1 = 1.0 - w0;

        if w0 <= 0.0 || w1 <= 0.0 {
            continue;
        }

        let mu0 = cumulative_weighted_sums[threshold_idx] / cumulative_sums[threshold_idx];
        let foreground_count = cumulative_sums[255] - cumulative_sums[threshold_idx];
        let mu1 = if foreground_count > 0.0 {
            (total_weighted_sum - cumulative_weighted_sums[threshold_idx]) / foreground_count
        } else {
            0.0
        };

        let variance = w0 * w1 * (mu0 - mu1).powi(2);

        if variance > max_variance {
            max_variance = variance;
            optimal_threshold = threshold_idx as u8;
        }
    }

    optimal_threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_otsu_threshold_two_regions() {
        let mut img = GrayImage::new(10, 10);
        for y in 0..10 {
            for x in 0..10 {
                let value = if x < 5 { 25 } else { 225 };
                img.put_pixel(x, y, image::Luma([value]));
            }
        }

        let result = apply_otsu_threshold(&img)
            .expect("apply_otsu_threshold should succeed with valid grayscale image");

        assert!(result.threshold >= 25 && result.threshold < 225);
        assert_eq!(result.image.get_pixel(0, 0)[0], 0);
        assert_eq!(result.image.get_pixel(9, 9)[0], 255);
        for pixel in result.image.pixels() {
            assert!(pixel[0] == 0 || pixel[0] == 255);
        }
    }

    #[test]
    fn test_apply_otsu_threshold_empty_image() {
        let img = GrayImage::new(0, 0);
        assert!(matches!(
            apply_otsu_threshold(&img),
            Err(PreprocessingError::ProcessingFailed { .. })
        ));
    }

    #[test]
    fn test_find_otsu_threshold_basic() {
        let mut histogram = [0u32; 256];
        histogram[25] = 5000;
        histogram[225] = 5000;

        let threshold = find_otsu_threshold(&histogram, 10000.0);
        assert!((25..225).contains(&threshold));
    }

    #[test]
    fn test_find_otsu_threshold_single_intensity() {
        let mut histogram = [0u32; 256];
        histogram[128] = 100;

        assert_eq!(find_otsu_threshold(&histogram, 100.0), 128);
    }
}
