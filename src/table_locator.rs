//! # Segment Table Locator
//!
//! Finds the bounds of the segmental analysis table (per body part lean and
//! fat mass) from its printed rules, falling back to the scaled layout
//! constants when the rules cannot be found.

use image::GrayImage;
use serde::Serialize;
use tracing::debug;

use crate::matching_params::ScaledMatchingParameters;
use crate::preprocessing::apply_otsu_threshold;

/// Share of a run that must be ink for it to count as a printed rule.
/// Text rows have far more gaps than this allows.
const MIN_RULE_FILL: f32 = 0.8;
/// Share of the table band a vertical rule must span to bound the table.
const MIN_VERTICAL_COVERAGE: f32 = 0.5;

/// Where the bounds came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundsSource {
    /// Snapped to detected rules
    Detected,
    /// Scaled layout constants and the full image width
    Fallback,
}

/// One of the two side-by-side sub-tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableHalf {
    /// Segmental lean analysis
    Left,
    /// Segmental fat analysis
    Right,
}

/// Rectangle of the segment table in working-image pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct TableBounds {
    pub x_min: i32,
    pub x_max: i32,
    pub y_min: i32,
    pub y_max: i32,
    pub source: BoundsSource,
}

impl TableBounds {
    /// Fallback bounds: scaled layout constants across the full width.
    pub fn fallback(image_width: u32, params: &ScaledMatchingParameters) -> Self {
        Self {
            x_min: 0,
            x_max: image_width.saturating_sub(1) as i32,
            y_min: params.position.segment_y_min,
            y_max: params.position.segment_y_max,
            source: BoundsSource::Fallback,
        }
    }

    pub fn width(&self) -> i32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> i32 {
        self.y_max - self.y_min
    }

    pub fn contains(&self, point: (i32, i32)) -> bool {
        (self.x_min..=self.x_max).contains(&point.0) && (self.y_min..=self.y_max).contains(&point.1)
    }

    /// Left or right half of the table.
    pub fn half(&self, half: TableHalf) -> TableBounds {
        let mid = self.x_min + self.width() / 2;
        match half {
            TableHalf::Left => TableBounds { x_max: mid, ..*self },
            TableHalf::Right => TableBounds { x_min: mid, ..*self },
        }
    }
}

/// A detected straight rule.
///
/// For horizontal rules `position` is the row and `start..=end` the column
/// range; for vertical rules it is the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSegment {
    pub position: i32,
    pub start: i32,
    pub end: i32,
    pub thickness: i32,
}

impl RuleSegment {
    pub fn length(&self) -> i32 {
        self.end - self.start + 1
    }

    fn overlap(&self, start: i32, end: i32) -> i32 {
        (self.end.min(end) - self.start.max(start) + 1).max(0)
    }
}

/// Stateless locator for the segmental table.
#[derive(Debug, Clone, Copy, Default)]
pub struct TableLocator;

impl TableLocator {
    /// Locates the segment table on the working image.
    ///
    /// Never fails: when no suitable pair of rules is found the scaled layout
    /// constants are returned with [`BoundsSource::Fallback`].
    pub fn locate_segment_table(gray: &GrayImage, params: &ScaledMatchingParameters) -> TableBounds {
        let (width, height) = gray.dimensions();
        let fallback = TableBounds::fallback(width, params);

        let binary = match apply_otsu_threshold(gray) {
            Ok(result) => result.image,
            Err(e) => {
                debug!(error = %e, "Cannot binarise page, using fallback table bounds");
                return fallback;
            }
        };

        let margin = params.distance.table_snap_margin;
        let expected_top = params.position.segment_y_min;
        let expected_bottom = params.position.segment_y_max;

        let band_start = (expected_top - margin).max(0);
        let band_end = (expected_bottom + margin).min(height as i32 - 1);
        if band_end <= band_start {
            return fallback;
        }

        let horizontal = detect_horizontal_rules(
            &binary,
            band_start,
            band_end,
            params.min_line_length(),
            params.max_line_gap(),
        );

        let top = closest_rule(&horizontal, expected_top, margin);
        let bottom = closest_rule(&horizontal, expected_bottom, margin);

        let (top, bottom) = match (top, bottom) {
            (Some(top), Some(bottom)) if top.position < bottom.position => (top, bottom),
            _ => {
                debug!(
                    rules = horizontal.len(),
                    expected_top, expected_bottom, "No rule pair near the segment table, using fallback"
                );
                return fallback;
            }
        };

        let vertical = detect_vertical_rules(
            &binary,
            top.position,
            bottom.position,
            params.min_line_length(),
            params.max_line_gap(),
        );
        let band_height = (bottom.position - top.position + 1) as f32;
        let spanning: Vec<&RuleSegment> = vertical
            .iter()
            .filter(|r| r.overlap(top.position, bottom.position) as f32 >= band_height * MIN_VERTICAL_COVERAGE)
            .collect();

        let (x_min, x_max) = match (
            spanning.iter().map(|r| r.position).min(),
            spanning.iter().map(|r| r.position).max(),
        ) {
            (Some(left), Some(right)) if right > left => (left, right),
            _ => (0, width.saturating_sub(1) as i32),
        };

        let bounds = TableBounds {
            x_min,
            x_max,
            y_min: top.position,
            y_max: bottom.position,
            source: BoundsSource::Detected,
        };
        debug!(
            x_min = bounds.x_min,
            x_max = bounds.x_max,
            y_min = bounds.y_min,
            y_max = bounds.y_max,
            vertical_rules = spanning.len(),
            "Segment table located"
        );
        bounds
    }
}

fn closest_rule(rules: &[RuleSegment], expected: i32, margin: i32) -> Option<RuleSegment> {
    rules
        .iter()
        .filter(|r| (r.position - expected).abs() <= margin)
        .min_by_key(|r| ((r.position - expected).abs(), -r.length()))
        .copied()
}

/// Horizontal rules on rows `row_start..=row_end` of a binary image (ink = 0).
pub fn detect_horizontal_rules(
    binary: &GrayImage,
    row_start: i32,
    row_end: i32,
    min_length: i32,
    max_gap: i32,
) -> Vec<RuleSegment> {
    let (width, height) = binary.dimensions();
    let rows = row_start.max(0)..=row_end.min(height as i32 - 1);
    let runs = rows
        .flat_map(|y| {
            scan_runs(width as i32, min_length, max_gap, |x| {
                binary.get_pixel(x as u32, y as u32)[0] == 0
            })
            .into_iter()
            .map(move |(start, end)| (y, start, end))
        })
        .collect();
    merge_runs(runs)
}

/// Vertical rules on rows `row_start..=row_end` of a binary image (ink = 0).
pub fn detect_vertical_rules(
    binary: &GrayImage,
    row_start: i32,
    row_end: i32,
    min_length: i32,
    max_gap: i32,
) -> Vec<RuleSegment> {
    let (width, height) = binary.dimensions();
    let first = row_start.max(0);
    let last = row_end.min(height as i32 - 1);
    if last < first {
        return Vec::new();
    }
    let runs = (0..width as i32)
        .flat_map(|x| {
            scan_runs(last - first + 1, min_length, max_gap, |i| {
                binary.get_pixel(x as u32, (first + i) as u32)[0] == 0
            })
            .into_iter()
            .map(move |(start, end)| (x, start + first, end + first))
        })
        .collect();
    merge_runs(runs)
}

/// Ink runs along one line of `len` pixels, bridging gaps up to `max_gap`.
fn scan_runs(len: i32, min_length: i32, max_gap: i32, is_ink: impl Fn(i32) -> bool) -> Vec<(i32, i32)> {
    let mut runs = Vec::new();
    let mut current: Option<(i32, i32, i32)> = None; // (start, last ink, ink count)

    let close = |run: (i32, i32, i32), runs: &mut Vec<(i32, i32)>| {
        let (start, last, ink) = run;
        let length = last - start + 1;
        if length >= min_length && ink as f32 >= length as f32 * MIN_RULE_FILL {
            runs.push((start, last));
        }
    };

    for i in 0..len {
        if !is_ink(i) {
            continue;
        }
        current = match current {
            Some((start, last, ink)) if i - last - 1 <= max_gap => Some((start, i, ink + 1)),
            Some(run) => {
                close(run, &mut runs);
                Some((i, i, 1))
            }
            None => Some((i, i, 1)),
        };
    }
    if let Some(run) = current {
        close(run, &mut runs);
    }
    runs
}

/// Merges runs on adjacent lines that overlap into single thick rules.
fn merge_runs(mut runs: Vec<(i32, i32, i32)>) -> Vec<RuleSegment> {
    runs.sort_unstable();

    // (first line, last line, start, end)
    let mut groups: Vec<(i32, i32, i32, i32)> = Vec::new();
    for (line, start, end) in runs {
        let length = end - start + 1;
        let joined = groups.iter_mut().rev().find(|g| {
            g.1 + 1 >= line && {
                let overlap = g.3.min(end) - g.2.max(start) + 1;
                overlap * 2 >= length.min(g.3 - g.2 + 1)
            }
        });
        match joined {
            Some(group) => {
                group.1 = group.1.max(line);
                group.2 = group.2.min(start);
                group.3 = group.3.max(end);
            }
            None => groups.push((line, line, start, end)),
        }
    }

    groups
        .into_iter()
        .map(|(first, last, start, end)| RuleSegment {
            position: (first + last) / 2,
            start,
            end,
            thickness: last - first + 1,
        })
        .collect()
}
