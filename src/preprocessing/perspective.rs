//! # Perspective Correction
//!
//! Finds the page outline as the largest outer contour of the binarised
//! photo and warps it onto an axis-aligned rectangle.

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::geometric_transformations::{warp_into, Interpolation, Projection};
use tracing;

use super::thresholding::apply_otsu_threshold;
use super::types::{PreprocessingError, Quad};

/// Minimum share of the frame the page outline must cover.
const MIN_PAGE_AREA_RATIO: f32 = 0.2;
/// Corners closer than this share of the frame size count as touching the frame.
const FRAME_CORNER_TOLERANCE: f32 = 0.02;

/// Locates the four page corners in a grayscale photo.
///
/// # Errors
///
/// `PreprocessingError::InsufficientFeatures` when no contour is large enough,
/// and `ProcessingFailed` when the outline simply follows the frame (the page
/// fills the whole photo, so there is no border to rectify).
pub fn find_page_quad(gray: &GrayImage) -> Result<Quad, PreprocessingError> {
    let binary = apply_otsu_threshold(gray)?;
    let (width, height) = binary.image.dimensions();

    let contours: Vec<Contour<i32>> = find_contours(&binary.image);
    let outer: Vec<&Contour<i32>> = contours
        .iter()
        .filter(|c| c.border_type == BorderType::Outer && c.points.len() >= 4)
        .collect();

    let quad = outer
        .iter()
        .map(|contour| corners_of(contour))
        .max_by(|a, b| a.area().total_cmp(&b.area()))
        .ok_or(PreprocessingError::InsufficientFeatures {
            found: 0,
            required: 1,
        })?;

    let frame_area = width as f32 * height as f32;
    if quad.area() < frame_area * MIN_PAGE_AREA_RATIO {
        return Err(PreprocessingError::InsufficientFeatures {
            found: outer.len(),
            required: 1,
        });
    }

    if follows_frame(&quad, width, height) {
        return Err(PreprocessingError::ProcessingFailed {
            message: "page outline coincides with the image frame".to_string(),
        });
    }

    tracing::debug!(
        target: "inbody_preprocessing",
        "Page outline found: {:?} ({:.0}% of frame)",
        quad,
        100.0 * quad.area() / frame_area
    );

    Ok(quad)
}

/// Extreme points of a contour: the classic sum/difference corner heuristic.
fn corners_of(contour: &Contour<i32>) -> Quad {
    let mut top_left = contour.points[0];
    let mut bottom_right = contour.points[0];
    let mut top_right = contour.points[0];
    let mut bottom_left = contour.points[0];

    for p in &contour.points {
        if p.x + p.y < top_left.x + top_left.y {
            top_left = *p;
        }
        if p.x + p.y > bottom_right.x + bottom_right.y {
            bottom_right = *p;
        }
        if p.x - p.y > top_right.x - top_right.y {
            top_right = *p;
        }
        if p.x - p.y < bottom_left.x - bottom_left.y {
            bottom_left = *p;
        }
    }

    let f = |p: imageproc::point::Point<i32>| (p.x as f32, p.y as f32);
    Quad {
        top_left: f(top_left),
        top_right: f(top_right),
        bottom_right: f(bottom_right),
        bottom_left: f(bottom_left),
    }
}

fn follows_frame(quad: &Quad, width: u32, height: u32) -> bool {
    let tol_x = width as f32 * FRAME_CORNER_TOLERANCE;
    let tol_y = height as f32 * FRAME_CORNER_TOLERANCE;
    let w = width.saturating_sub(1) as f32;
    let h = height.saturating_sub(1) as f32;
    let frame = [(0.0, 0.0), (w, 0.0), (w, h), (0.0, h)];

    quad.as_array()
        .iter()
        .zip(frame.iter())
        .all(|(c, f)| (c.0 - f.0).abs() <= tol_x && (c.1 - f.1).abs() <= tol_y)
}

fn distance(a: (f32, f32), b: (f32, f32)) -> f32 {
    ((a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)).sqrt()
}

/// Warps the page quadrilateral onto an upright rectangle.
///
/// The output size is taken from the longer of each pair of opposite edges.
pub fn warp_page(image: &DynamicImage, quad: &Quad) -> Result<DynamicImage, PreprocessingError> {
    let width = distance(quad.top_left, quad.top_right)
        .max(distance(quad.bottom_left, quad.bottom_right))
        .round();
    let height = distance(quad.top_left, quad.bottom_left)
        .max(distance(quad.top_right, quad.bottom_right))
        .round();

    if width < 2.0 || height < 2.0 {
        return Err(PreprocessingError::ProcessingFailed {
            message: format!("degenerate page outline {}x{}", width, height),
        });
    }

    let target = [(0.0, 0.0), (width, 0.0), (width, height), (0.0, height)];
    let projection = Projection::from_control_points(quad.as_array(), target).ok_or_else(|| {
        PreprocessingError::ProcessingFailed {
            message: "page outline does not define a projective transform".to_string(),
        }
    })?;

    let rgb = image.to_rgb8();
    let mut out = RgbImage::from_pixel(width as u32, height as u32, Rgb([255, 255, 255]));
    warp_into(
        &rgb,
        &projection,
        Interpolation::Bilinear,
        Rgb([255, 255, 255]),
        &mut out,
    );

    Ok(DynamicImage::ImageRgb8(out))
}
