//! # Image Deskewing Module
//!
//! Skew detection from straight page features and rotation correction.
//!
//! The report is full of long printed rules (table borders, chart axes), so the
//! dominant skew is estimated from Hough lines over a Canny edge map rather
//! than from text projection profiles.

use image::{imageops::FilterType, DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::edges::canny;
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};
use tracing;

use super::types::{PreprocessingError, SkewEstimate};

/// Height the analysis copy is reduced to before edge detection.
const ANALYSIS_HEIGHT: u32 = 800;
/// Minimum number of Hough lines required to trust an estimate.
pub const MIN_SKEW_LINES: usize = 2;
const CANNY_LOW: f32 = 50.0;
const CANNY_HIGH: f32 = 150.0;
const SUPPRESSION_RADIUS: u32 = 8;

/// Estimates the dominant skew angle of a page.
///
/// Each detected line votes with its deviation from the nearest axis; the
/// median deviation is the skew. Positive angles mean the page content is
/// rotated clockwise.
///
/// # Errors
///
/// `PreprocessingError::InsufficientFeatures` when fewer than
/// [`MIN_SKEW_LINES`] lines are found.
pub fn estimate_skew(gray: &GrayImage) -> Result<SkewEstimate, PreprocessingError> {
    let start_time = std::time::Instant::now();
    let analysis = downsample_for_analysis(gray);
    let (width, height) = analysis.dimensions();

    if width < 8 || height < 8 {
        return Err(PreprocessingError::InsufficientFeatures {
            found: 0,
            required: MIN_SKEW_LINES,
        });
    }

    let edges = canny(&analysis, CANNY_LOW, CANNY_HIGH);
    let options = LineDetectionOptions {
        vote_threshold: (width.min(height) / 4).max(20),
        suppression_radius: SUPPRESSION_RADIUS,
    };
    let lines = detect_lines(&edges, options);

    let mut deviations: Vec<f32> = lines.iter().map(axis_deviation).collect();
    if deviations.len() < MIN_SKEW_LINES {
        return Err(PreprocessingError::InsufficientFeatures {
            found: deviations.len(),
            required: MIN_SKEW_LINES,
        });
    }

    deviations.sort_by(|a, b| a.total_cmp(b));
    let median = deviations[deviations.len() / 2];

    let spread = deviations.iter().map(|d| (d - median).abs()).sum::<f32>() / deviations.len() as f32;
    let confidence = (1.0 - spread / 45.0).clamp(0.0, 1.0);

    tracing::debug!(
        target: "inbody_preprocessing",
        "Skew estimation completed in {}ms: {:.1}° from {} lines (confidence {:.2})",
        start_time.elapsed().as_millis(),
        median,
        deviations.len(),
        confidence
    );

    Ok(SkewEstimate {
        angle_degrees: median,
        line_count: deviations.len(),
        confidence,
    })
}

/// Deviation of a Hough line from the closest image axis, in (-45, 45].
fn axis_deviation(line: &PolarLine) -> f32 {
    // angle_in_degrees is the angle of the line normal: 90 for horizontal lines
    let angle = line.angle_in_degrees as f32;
    if (45.0..=135.0).contains(&angle) {
        angle - 90.0
    } else if angle < 45.0 {
        angle
    } else {
        angle - 180.0
    }
}

fn downsample_for_analysis(gray: &GrayImage) -> GrayImage {
    let (width, height) = gray.dimensions();
    if height <= ANALYSIS_HEIGHT || height == 0 {
        return gray.clone();
    }
    let new_width = ((width as f64 * ANALYSIS_HEIGHT as f64) / height as f64).round().max(1.0) as u32;
    image::imageops::resize(gray, new_width, ANALYSIS_HEIGHT, FilterType::Triangle)
}

/// Rotates an image by the negated skew so that the page becomes level.
///
/// The canvas grows to hold the rotated corners; uncovered pixels are white.
pub fn rotate_to_level(image: &DynamicImage, skew_degrees: f32) -> DynamicImage {
    let rgb = image.to_rgb8();
    let (width, height) = rgb.dimensions();
    let angle_rad = -skew_degrees.to_radians();

    let cos_a = angle_rad.cos();
    let sin_a = angle_rad.sin();

    let corners = [
        (-(width as f32) / 2.0, -(height as f32) / 2.0),
        (width as f32 / 2.0, -(height as f32) / 2.0),
        (-(width as f32) / 2.0, height as f32 / 2.0),
        (width as f32 / 2.0, height as f32 / 2.0),
    ];

    let mut min_x: f32 = 0.0;
    let mut max_x: f32 = 0.0;
    let mut min_y: f32 = 0.0;
    let mut max_y: f32 = 0.0;

    for (x, y) in corners.iter() {
        let rotated_x = x * cos_a - y * sin_a;
        let rotated_y = x * sin_a + y * cos_a;
        min_x = min_x.min(rotated_x);
        max_x = max_x.max(rotated_x);
        min_y = min_y.min(rotated_y);
        max_y = max_y.max(rotated_y);
    }

    let new_width = (max_x - min_x).ceil().max(1.0) as u32;
    let new_height = (max_y - min_y).ceil().max(1.0) as u32;

    let mut rotated = RgbImage::from_pixel(new_width, new_height, Rgb([255, 255, 255]));

    // Nearest neighbour keeps glyph edges crisp for OCR
    for y in 0..new_height {
        for x in 0..new_width {
            let cx = x as f32 - new_width as f32 / 2.0;
            let cy = y as f32 - new_height as f32 / 2.0;

            let orig_x = cx * cos_a + cy * sin_a + width as f32 / 2.0;
            let orig_y = -cx * sin_a + cy * cos_a + height as f32 / 2.0;

            if orig_x >= 0.0 && orig_x < width as f32 && orig_y >= 0.0 && orig_y < height as f32 {
                rotated.put_pixel(x, y, *rgb.get_pixel(orig_x as u32, orig_y as u32));
            }
        }
    }

    tracing::debug!(
        target: "inbody_preprocessing",
        "Rotated {}x{} image by {:.2}° into {}x{}",
        width,
        height,
        -skew_degrees,
        new_width,
        new_height
    );

    DynamicImage::ImageRgb8(rotated)
}
