//! # Matching Parameters
//!
//! Geometric and scoring constants tuned on the canonical 2400 px report, and
//! their resolution-adjusted counterpart.
//!
//! Constants fall into three groups:
//!
//! - **Position**: absolute canonical coordinates, scaled linearly.
//! - **Distance/margin**: pixel offsets, scaled linearly; the two line
//!   detection values are floored at [`MIN_LINE_LENGTH_FLOOR`] and
//!   [`MAX_LINE_GAP_FLOOR`].
//! - **Ratio/weight**: dimensionless, copied unchanged.
//!
//! The canonical table is a `const` and is never mutated; scaling always
//! produces a fresh [`ScaledMatchingParameters`].

use serde::{Deserialize, Serialize};

use crate::errors::{InBodyError, InBodyResult};
use crate::scale::ScaleManager;

/// Smallest minimum-line-length the table locator will ever use.
pub const MIN_LINE_LENGTH_FLOOR: i32 = 40;
/// Smallest maximum-line-gap the table locator will ever use.
pub const MAX_LINE_GAP_FLOOR: i32 = 5;

/// Absolute vertical positions of report landmarks.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionParams {
    /// Top of the segmental (per body part) table
    pub segment_y_min: i32,
    /// Bottom of the segmental table
    pub segment_y_max: i32,
    /// Centre of the muscle-fat analysis chart (weight / SMM / body fat mass rows)
    pub muscle_fat_y: i32,
    /// Vertical position of the percent-body-fat line in the obesity chart
    pub body_fat_line_y: i32,
    /// Centre of the metabolism block (BMR, visceral fat, waist-hip ratio)
    pub metabolism_y: i32,
}

/// Pixel offsets and sizes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistanceParams {
    pub keyword_search_y_margin: i32,
    pub roi_y_margin: i32,
    pub right_dir_x_min: i32,
    pub right_dir_x_max: i32,
    pub right_dir_y_max: i32,
    pub left_dir_x_min: i32,
    pub left_dir_x_max: i32,
    pub left_dir_y_max: i32,
    pub below_dir_x_max: i32,
    pub below_dir_y_max: i32,
    /// Weight of the normalized vertical distance in candidate scoring
    pub distance_y_weight: i32,
    /// Glyph height from which a node counts as a printed value
    pub large_node_min_height: i32,
    /// Glyph height up to which a bare integer may be a chart scale mark
    pub scale_mark_max_height: i32,
    /// How far a detected table line may sit from its expected position
    pub table_snap_margin: i32,
    pub min_line_length: i32,
    pub max_line_gap: i32,
}

/// Dimensionless thresholds and scoring weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioParams {
    /// Minimum normalized similarity for a node to count as a keyword match
    pub similarity_threshold: f32,
    pub large_node_bonus: f32,
    pub scale_mark_penalty: f32,
}

/// Constants at the canonical resolution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchingParameters {
    pub position: PositionParams,
    pub distance: DistanceParams,
    pub ratio: RatioParams,
}

impl MatchingParameters {
    /// The tuned table for the supported report layout.
    pub const CANONICAL: MatchingParameters = MatchingParameters {
        position: PositionParams {
            segment_y_min: 1400,
            segment_y_max: 1900,
            muscle_fat_y: 780,
            body_fat_line_y: 1120,
            metabolism_y: 2100,
        },
        distance: DistanceParams {
            keyword_search_y_margin: 50,
            roi_y_margin: 30,
            right_dir_x_min: 10,
            right_dir_x_max: 1000,
            right_dir_y_max: 40,
            left_dir_x_min: 10,
            left_dir_x_max: 600,
            left_dir_y_max: 40,
            below_dir_x_max: 150,
            below_dir_y_max: 160,
            distance_y_weight: 10,
            large_node_min_height: 40,
            scale_mark_max_height: 30,
            table_snap_margin: 150,
            min_line_length: 100,
            max_line_gap: 10,
        },
        ratio: RatioParams {
            similarity_threshold: 0.7,
            large_node_bonus: 3.0,
            scale_mark_penalty: 8.0,
        },
    };

    /// Derive the resolution-adjusted parameters for `manager`.
    ///
    /// Pure: the same inputs always give the same output and `self` is untouched.
    pub fn scale(&self, manager: &ScaleManager) -> ScaledMatchingParameters {
        let p = &self.position;
        let d = &self.distance;
        let s = |v: i32| manager.scale_floor(v);

        ScaledMatchingParameters {
            scale_ratio: manager.scale_ratio(),
            position: PositionParams {
                segment_y_min: s(p.segment_y_min),
                segment_y_max: s(p.segment_y_max),
                muscle_fat_y: s(p.muscle_fat_y),
                body_fat_line_y: s(p.body_fat_line_y),
                metabolism_y: s(p.metabolism_y),
            },
            distance: DistanceParams {
                keyword_search_y_margin: s(d.keyword_search_y_margin),
                roi_y_margin: s(d.roi_y_margin),
                right_dir_x_min: s(d.right_dir_x_min),
                right_dir_x_max: s(d.right_dir_x_max),
                right_dir_y_max: s(d.right_dir_y_max),
                left_dir_x_min: s(d.left_dir_x_min),
                left_dir_x_max: s(d.left_dir_x_max),
                left_dir_y_max: s(d.left_dir_y_max),
                below_dir_x_max: s(d.below_dir_x_max),
                below_dir_y_max: s(d.below_dir_y_max),
                distance_y_weight: s(d.distance_y_weight),
                large_node_min_height: s(d.large_node_min_height),
                scale_mark_max_height: s(d.scale_mark_max_height),
                table_snap_margin: s(d.table_snap_margin),
                min_line_length: s(d.min_line_length).max(MIN_LINE_LENGTH_FLOOR),
                max_line_gap: s(d.max_line_gap).max(MAX_LINE_GAP_FLOOR),
            },
            ratio: self.ratio,
        }
    }

    /// Check that every constant is usable.
    pub fn validate(&self) -> InBodyResult<()> {
        let p = &self.position;
        if p.segment_y_min <= 0 || p.segment_y_max <= p.segment_y_min {
            return Err(InBodyError::Configuration(format!(
                "segment table bounds are invalid: {}..{}",
                p.segment_y_min, p.segment_y_max
            )));
        }

        let d = &self.distance;
        let margins = [
            ("keyword_search_y_margin", d.keyword_search_y_margin),
            ("roi_y_margin", d.roi_y_margin),
            ("right_dir_x_max", d.right_dir_x_max),
            ("right_dir_y_max", d.right_dir_y_max),
            ("left_dir_x_max", d.left_dir_x_max),
            ("left_dir_y_max", d.left_dir_y_max),
            ("below_dir_x_max", d.below_dir_x_max),
            ("below_dir_y_max", d.below_dir_y_max),
            ("distance_y_weight", d.distance_y_weight),
            ("large_node_min_height", d.large_node_min_height),
            ("scale_mark_max_height", d.scale_mark_max_height),
            ("table_snap_margin", d.table_snap_margin),
            ("min_line_length", d.min_line_length),
            ("max_line_gap", d.max_line_gap),
        ];
        for (name, value) in margins {
            if value <= 0 {
                return Err(InBodyError::Configuration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }
        if d.right_dir_x_min < 0 || d.right_dir_x_min >= d.right_dir_x_max {
            return Err(InBodyError::Configuration(
                "right_dir_x_min must be in [0, right_dir_x_max)".to_string(),
            ));
        }
        if d.left_dir_x_min < 0 || d.left_dir_x_min >= d.left_dir_x_max {
            return Err(InBodyError::Configuration(
                "left_dir_x_min must be in [0, left_dir_x_max)".to_string(),
            ));
        }

        let r = &self.ratio;
        if !(r.similarity_threshold > 0.0 && r.similarity_threshold <= 1.0) {
            return Err(InBodyError::Configuration(format!(
                "similarity_threshold must be in (0, 1], got {}",
                r.similarity_threshold
            )));
        }
        if r.large_node_bonus < 0.0 || r.scale_mark_penalty < 0.0 {
            return Err(InBodyError::Configuration(
                "scoring weights must not be negative".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for MatchingParameters {
    fn default() -> Self {
        Self::CANONICAL
    }
}

/// Parameters adjusted to one working resolution. Built per extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScaledMatchingParameters {
    pub scale_ratio: f64,
    pub position: PositionParams,
    pub distance: DistanceParams,
    pub ratio: RatioParams,
}

impl ScaledMatchingParameters {
    pub fn similarity_threshold(&self) -> f32 {
        self.ratio.similarity_threshold
    }

    pub fn keyword_search_y_margin(&self) -> i32 {
        self.distance.keyword_search_y_margin
    }

    pub fn min_line_length(&self) -> i32 {
        self.distance.min_line_length
    }

    pub fn max_line_gap(&self) -> i32 {
        self.distance.max_line_gap
    }
}
