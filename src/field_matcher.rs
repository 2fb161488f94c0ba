//! # Field Matcher
//!
//! Reads one field from recognized text nodes. Matching is a pipeline of
//! small pure functions:
//!
//! 1. [`find_anchor`] picks the node carrying the field's label
//! 2. [`region_of_interest`] derives the search rectangle from the anchor
//! 3. [`filter_candidates`] keeps plausible value nodes inside it
//! 4. [`score_candidate`] ranks them by vertical distance, glyph size and
//!    chart scale-mark resemblance
//! 5. [`normalize_value`] parses the winner
//!
//! A field that fails at any step becomes [`FieldValue::NotDetected`]; it
//! never affects other fields.

use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::errors::{error_logging, InBodyError, InBodyResult};
use crate::fields::{Direction, FieldCatalog, FieldDefinition, SearchRegion, ValueKind};
use crate::matching_params::ScaledMatchingParameters;
use crate::ocr::{BBox, TextNode};
use crate::table_locator::TableBounds;
use crate::text_matching::{
    is_bare_integer, label_similarity, parse_decimal, parse_grade, parse_integer,
};

/// Sentinel written for fields that were attempted but not found.
pub const NOT_DETECTED: &str = "미검출";

/// Outcome for one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    Detected(String),
    NotDetected,
    /// The configured template revision does not print this field
    Skipped,
}

impl FieldValue {
    pub fn is_detected(&self) -> bool {
        matches!(self, FieldValue::Detected(_))
    }

    pub fn is_attempted(&self) -> bool {
        !matches!(self, FieldValue::Skipped)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Detected(value) => Some(value),
            FieldValue::NotDetected => Some(NOT_DETECTED),
            FieldValue::Skipped => None,
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.as_str() {
            Some(value) => serializer.serialize_str(value),
            None => serializer.serialize_none(),
        }
    }
}

/// A node considered for one field, with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub node: &'a TextNode,
    pub score: f32,
    pub horizontal_distance: i32,
}

/// Everything a field match needs besides the nodes.
#[derive(Debug, Clone, Copy)]
pub struct MatchContext<'a> {
    pub params: &'a ScaledMatchingParameters,
    pub table: &'a TableBounds,
    /// Labels of every catalog field; nodes resembling them are never values
    pub labels: &'a [&'a str],
}

impl<'a> MatchContext<'a> {
    fn region_bounds(&self, region: SearchRegion) -> Option<TableBounds> {
        match region {
            SearchRegion::Page => None,
            SearchRegion::SegmentTable(half) => Some(self.table.half(half)),
        }
    }

    fn in_region(&self, region: SearchRegion, point: (i32, i32)) -> bool {
        self.region_bounds(region)
            .map_or(true, |bounds| bounds.contains(point))
    }

    fn looks_like_label(&self, text: &str) -> bool {
        let threshold = self.params.similarity_threshold();
        self.labels
            .iter()
            .any(|label| label_similarity(text, label) >= threshold)
    }
}

/// Best similarity of `text` to any of the field's labels.
fn field_similarity(field: &FieldDefinition, text: &str) -> f32 {
    field
        .labels()
        .map(|label| label_similarity(text, label))
        .fold(0.0, f32::max)
}

/// Finds the label node for `field`.
///
/// Matches must reach the similarity threshold and lie in the field's region.
/// With an anchor hint only matches within `keyword_search_y_margin` of the
/// hinted row count, and the closest one wins (ties go to the higher
/// similarity); otherwise the most similar match wins, then the top-most one.
pub fn find_anchor<'n>(
    nodes: &'n [TextNode],
    field: &FieldDefinition,
    ctx: &MatchContext<'_>,
) -> Option<&'n TextNode> {
    let threshold = ctx.params.similarity_threshold();
    let hint_y = field.anchor_hint.map(|hint| hint.resolve(ctx.params));
    let hint_margin = ctx.params.keyword_search_y_margin();

    // A look-alike label on another row must not stand in for a missing one
    let near_hint = |node: &TextNode| {
        hint_y.map_or(true, |y| (node.center.1 - y).abs() <= hint_margin)
    };

    let matches: Vec<(&TextNode, f32)> = nodes
        .iter()
        .filter(|node| ctx.in_region(field.region, node.center))
        .filter(|node| near_hint(*node))
        .map(|node| (node, field_similarity(field, &node.text)))
        .filter(|(_, similarity)| *similarity >= threshold)
        .collect();

    let best = matches.into_iter().min_by(|(a, sa), (b, sb)| {
        let by_hint = match hint_y {
            Some(y) => (a.center.1 - y).abs().cmp(&(b.center.1 - y).abs()),
            None => std::cmp::Ordering::Equal,
        };
        by_hint
            .then_with(|| sb.total_cmp(sa))
            .then_with(|| a.center.1.cmp(&b.center.1))
            .then_with(|| a.center.0.cmp(&b.center.0))
    });

    if let Some((node, similarity)) = best {
        trace!(
            field = %field.name,
            anchor = %node.text,
            similarity,
            x = node.center.0,
            y = node.center.1,
            "Anchor found"
        );
    }
    best.map(|(node, _)| node)
}

/// Search rectangle for the value of a field anchored at `anchor`.
///
/// For `Right` and `Left` the vertical band is the anchor's own box widened
/// by `roi_y_margin` on both sides, clipped to the direction's drift bound
/// around the anchor row. `Below` reaches `below_dir_y_max` under the anchor
/// centre and starts `roi_y_margin` above the anchor's bottom edge, never
/// higher than just under its centre.
pub fn region_of_interest(
    anchor: &TextNode,
    direction: Direction,
    params: &ScaledMatchingParameters,
) -> BBox {
    let d = &params.distance;
    let (cx, cy) = anchor.center;
    let band = |drift: i32| {
        (
            (anchor.bbox.y0 - d.roi_y_margin).max(cy - drift),
            (anchor.bbox.y1 + d.roi_y_margin).min(cy + drift),
        )
    };

    match direction {
        Direction::Right => {
            let (y0, y1) = band(d.right_dir_y_max);
            BBox::new(
                anchor.bbox.x1 + d.right_dir_x_min,
                y0,
                anchor.bbox.x1 + d.right_dir_x_max,
                y1,
            )
        }
        Direction::Left => {
            let (y0, y1) = band(d.left_dir_y_max);
            BBox::new(
                anchor.bbox.x0 - d.left_dir_x_max,
                y0,
                anchor.bbox.x0 - d.left_dir_x_min,
                y1,
            )
        }
        Direction::Below => {
            let y0 = (anchor.bbox.y1 - d.roi_y_margin).max(cy + 1);
            BBox::new(
                cx - d.below_dir_x_max,
                y0,
                cx + d.below_dir_x_max,
                (cy + d.below_dir_y_max).max(y0 + 1),
            )
        }
    }
}

/// Cheap check that a node could hold a value of `kind`.
fn plausible_for(kind: ValueKind, text: &str) -> bool {
    match kind {
        ValueKind::Decimal | ValueKind::Integer => text.chars().any(|c| c.is_ascii_digit()),
        ValueKind::Grade => parse_grade(text).is_some(),
    }
}

/// Nodes inside the ROI and the field's region that could be its value.
pub fn filter_candidates<'n>(
    nodes: &'n [TextNode],
    anchor: &TextNode,
    roi: &BBox,
    field: &FieldDefinition,
    ctx: &MatchContext<'_>,
) -> Vec<&'n TextNode> {
    nodes
        .iter()
        .filter(|node| !std::ptr::eq(*node, anchor) && node.bbox != anchor.bbox)
        .filter(|node| roi.contains(node.center))
        .filter(|node| ctx.in_region(field.region, node.center))
        .filter(|node| plausible_for(field.value_kind, &node.text))
        .filter(|node| !ctx.looks_like_label(&node.text))
        .collect()
}

/// Whether `node` looks like a tick label of a chart axis: a small bare
/// integer with at least two other bare integers on the same row.
pub fn looks_like_scale_mark(
    node: &TextNode,
    nodes: &[TextNode],
    params: &ScaledMatchingParameters,
) -> bool {
    let max_height = params.distance.scale_mark_max_height;
    if node.bbox.height() > max_height || !is_bare_integer(&node.text) {
        return false;
    }

    let row_tolerance = (max_height / 2).max(1);
    let neighbours = nodes
        .iter()
        .filter(|other| other.bbox != node.bbox)
        .filter(|other| (other.center.1 - node.center.1).abs() <= row_tolerance)
        .filter(|other| is_bare_integer(&other.text))
        .count();
    neighbours >= 2
}

/// Scores one candidate; higher is better.
pub fn score_candidate<'n>(
    node: &'n TextNode,
    anchor: &TextNode,
    roi: &BBox,
    nodes: &[TextNode],
    params: &ScaledMatchingParameters,
) -> Candidate<'n> {
    let d = &params.distance;
    let r = &params.ratio;

    let roi_height = roi.height().max(1) as f32;
    let dy = (node.center.1 - anchor.center.1).abs() as f32;
    let mut score = -(d.distance_y_weight as f32 * dy / roi_height);

    if node.bbox.height() >= d.large_node_min_height {
        score += r.large_node_bonus;
    }
    if looks_like_scale_mark(node, nodes, params) {
        score -= r.scale_mark_penalty;
    }

    Candidate {
        node,
        score,
        horizontal_distance: (node.center.0 - anchor.center.0).abs(),
    }
}

/// Parses the winning text into the canonical value string.
pub fn normalize_value(kind: ValueKind, text: &str) -> Option<String> {
    match kind {
        ValueKind::Decimal => parse_decimal(text),
        ValueKind::Integer => parse_integer(text),
        ValueKind::Grade => parse_grade(text).map(str::to_string),
    }
}

/// Highest score wins; ties go to the smaller horizontal distance.
fn best_candidate<'n>(candidates: Vec<Candidate<'n>>) -> Option<Candidate<'n>> {
    candidates.into_iter().max_by(|a, b| {
        a.score
            .total_cmp(&b.score)
            .then_with(|| b.horizontal_distance.cmp(&a.horizontal_distance))
    })
}

/// Runs the whole pipeline for one field.
///
/// # Errors
///
/// `FieldNotDetected` when no anchor or candidate survives, `ValueParse`
/// when the winning text cannot be parsed.
pub fn match_field(
    nodes: &[TextNode],
    field: &FieldDefinition,
    ctx: &MatchContext<'_>,
) -> InBodyResult<String> {
    let not_detected = || InBodyError::FieldNotDetected {
        field: field.name.clone(),
    };

    let anchor = find_anchor(nodes, field, ctx).ok_or_else(not_detected)?;
    let roi = region_of_interest(anchor, field.direction, ctx.params);
    let candidates: Vec<Candidate> = filter_candidates(nodes, anchor, &roi, field, ctx)
        .into_iter()
        .map(|node| score_candidate(node, anchor, &roi, nodes, ctx.params))
        .collect();

    debug!(
        field = %field.name,
        anchor = %anchor.text,
        candidates = candidates.len(),
        "Scored candidates"
    );

    let winner = best_candidate(candidates).ok_or_else(not_detected)?;
    normalize_value(field.value_kind, &winner.node.text).ok_or_else(|| InBodyError::ValueParse {
        field: field.name.clone(),
        text: winner.node.text.clone(),
    })
}

/// Matches every field of a catalog against one page.
pub struct FieldMatcher<'a> {
    catalog: &'a FieldCatalog,
    params: &'a ScaledMatchingParameters,
    template_revision: u32,
    labels: Vec<&'a str>,
}

impl<'a> FieldMatcher<'a> {
    pub fn new(
        catalog: &'a FieldCatalog,
        params: &'a ScaledMatchingParameters,
        template_revision: u32,
    ) -> Self {
        Self {
            catalog,
            params,
            template_revision,
            labels: catalog.all_labels(),
        }
    }

    /// Value of one field, with failures downgraded to the sentinel.
    pub fn extract_field(
        &self,
        nodes: &[TextNode],
        field: &FieldDefinition,
        table: &TableBounds,
    ) -> FieldValue {
        if field.min_revision > self.template_revision {
            debug!(
                field = %field.name,
                min_revision = field.min_revision,
                template_revision = self.template_revision,
                "Field not printed by this template revision"
            );
            return FieldValue::Skipped;
        }

        let ctx = MatchContext {
            params: self.params,
            table,
            labels: &self.labels,
        };

        match match_field(nodes, field, &ctx) {
            Ok(value) => FieldValue::Detected(value),
            Err(e) => {
                error_logging::log_field_failure(&e, &field.name, &field.keyword);
                FieldValue::NotDetected
            }
        }
    }

    /// Values of every catalog field, in catalog order.
    pub fn extract_all(&self, nodes: &[TextNode], table: &TableBounds) -> Vec<(String, FieldValue)> {
        self.catalog
            .fields
            .iter()
            .map(|field| {
                let _span = crate::observability::field_span(&field.name).entered();
                (field.name.clone(), self.extract_field(nodes, field, table))
            })
            .collect()
    }
}
