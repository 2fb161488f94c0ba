//! # Test Helper Library
//!
//! Synthetic InBody result sheets for integration tests. A report is laid out
//! in canonical 2400 px coordinates and scaled to the requested height; the
//! text nodes are handed to the matcher through a stub recognizer while the
//! rendered page only carries the ruled segment table.

#![allow(dead_code)]

use image::{DynamicImage, GrayImage, Luma};
use imageproc::drawing::draw_filled_rect_mut;
use imageproc::rect::Rect;
use inbody_extract::config::ExtractionConfig;
use inbody_extract::fields::FieldCatalog;
use inbody_extract::matcher::InBodyMatcher;
use inbody_extract::ocr::{BBox, Recognizer, TextNode};
use inbody_extract::InBodyResult;
use std::sync::Arc;
use std::time::Duration;

pub const CANONICAL_WIDTH: i32 = 1700;
pub const CANONICAL_HEIGHT: i32 = 2400;

const LABEL_HEIGHT: i32 = 40;
const VALUE_HEIGHT: i32 = 44;
const GRADE_HEIGHT: i32 = 30;
const TICK_HEIGHT: i32 = 24;

/// Segment table rules in canonical coordinates
pub const TABLE_TOP: i32 = 1400;
pub const TABLE_BOTTOM: i32 = 1900;
pub const TABLE_LEFT: i32 = 40;
pub const TABLE_RIGHT: i32 = 1660;
pub const TABLE_MIDDLE: i32 = 850;

const SEGMENT_ROWS: [(&str, &str, &str, &str, &str); 5] = [
    ("오른팔", "3.12", "표준", "0.8", "표준"),
    ("왼팔", "3.05", "표준", "0.9", "표준이상"),
    ("몸통", "24.8", "표준", "7.6", "표준이상"),
    ("오른다리", "8.91", "표준이하", "2.4", "표준"),
    ("왼다리", "8.87", "표준이하", "2.5", "표준"),
];
const SEGMENT_PARTS: [&str; 5] = ["right_arm", "left_arm", "trunk", "right_leg", "left_leg"];
const SEGMENT_FIRST_ROW: i32 = 1450;
const SEGMENT_ROW_STEP: i32 = 90;
const GRADE_OFFSET: i32 = 45;

/// A node in canonical coordinates
#[derive(Debug, Clone)]
pub struct CanonicalNode {
    pub text: String,
    pub x0: i32,
    pub y_center: i32,
    pub width: i32,
    pub height: i32,
}

impl CanonicalNode {
    fn new(text: &str, x0: i32, y_center: i32, width: i32, height: i32) -> Self {
        Self {
            text: text.to_string(),
            x0,
            y_center,
            width,
            height,
        }
    }

    fn scaled(&self, height: u32) -> TextNode {
        let s = |v: i32| scale_coord(v, height);
        let half = self.height / 2;
        TextNode::new(
            self.text.clone(),
            BBox::new(
                s(self.x0),
                s(self.y_center - half),
                s(self.x0 + self.width),
                s(self.y_center + half),
            ),
        )
    }
}

/// Canonical coordinate at working height `height`.
pub fn scale_coord(value: i32, height: u32) -> i32 {
    (i64::from(value) * i64::from(height) / i64::from(CANONICAL_HEIGHT)) as i32
}

/// Builder for a synthetic result sheet.
#[derive(Debug, Clone)]
pub struct SyntheticReport {
    nodes: Vec<CanonicalNode>,
    expected: Vec<(String, String)>,
}

impl SyntheticReport {
    /// The standard sheet with every field of the built-in catalog printed.
    pub fn standard() -> Self {
        let mut report = Self {
            nodes: Vec::new(),
            expected: Vec::new(),
        };

        // Body composition block
        report.labelled("total_body_water", "체수분", 300, "42.1");
        report.labelled("protein", "단백질", 360, "11.3");
        report.labelled("minerals", "무기질", 420, "3.89");
        report.push_label("체중", 100, 480);
        report.push_value("72.4", 420, 480);

        // Muscle-fat chart
        report.labelled("weight", "체중", 720, "72.4");
        report.labelled("skeletal_muscle_mass", "골격근량", 780, "32.5");
        for (i, tick) in ["70", "85", "100", "115", "130"].iter().enumerate() {
            report.push_tick(tick, 700 + 120 * i as i32, 780);
        }
        report.labelled("body_fat_mass", "체지방량", 840, "15.2");

        // Obesity chart
        report.labelled("bmi", "BMI", 1060, "23.9");
        report.labelled("percent_body_fat", "체지방률", 1120, "21.0");
        for (i, tick) in ["10", "20", "30", "40"].iter().enumerate() {
            report.push_tick(tick, 700 + 120 * i as i32, 1160);
        }

        // Score box, value printed under its label
        report.nodes.push(CanonicalNode::new("인바디점수", 1300, 1250, 160, LABEL_HEIGHT));
        report.nodes.push(CanonicalNode::new("78", 1355, 1320, 50, VALUE_HEIGHT));
        report.expect("inbody_score", "78");

        // Segment table, muscle on the left and fat on the right
        for (i, (label, muscle, muscle_grade, fat, fat_grade)) in SEGMENT_ROWS.iter().enumerate() {
            let y = SEGMENT_FIRST_ROW + SEGMENT_ROW_STEP * i as i32;
            let part = SEGMENT_PARTS[i];

            report.push_label(label, 80, y);
            report.push_value(muscle, 300, y);
            report
                .nodes
                .push(CanonicalNode::new(muscle_grade, 90, y + GRADE_OFFSET, 100, GRADE_HEIGHT));
            report.expect(&format!("{}_muscle", part), muscle);
            report.expect(&format!("{}_muscle_grade", part), muscle_grade);

            report.push_label(label, 890, y);
            report.push_value(fat, 1110, y);
            report
                .nodes
                .push(CanonicalNode::new(fat_grade, 900, y + GRADE_OFFSET, 100, GRADE_HEIGHT));
            report.expect(&format!("{}_fat", part), fat);
            report.expect(&format!("{}_fat_grade", part), fat_grade);
        }

        // Metabolism block
        report.labelled("basal_metabolic_rate", "기초대사량", 2100, "1,523");
        report.expect("basal_metabolic_rate", "1523");
        report.labelled("visceral_fat_level", "내장지방레벨", 2170, "9");
        report.labelled("waist_hip_ratio", "복부지방률", 2240, "0.88");

        report
    }

    fn push_label(&mut self, text: &str, x0: i32, y: i32) {
        let width = 40 * text.chars().count() as i32;
        self.nodes.push(CanonicalNode::new(text, x0, y, width, LABEL_HEIGHT));
    }

    fn push_value(&mut self, text: &str, x0: i32, y: i32) {
        self.nodes.push(CanonicalNode::new(text, x0, y, 100, VALUE_HEIGHT));
    }

    fn push_tick(&mut self, text: &str, x0: i32, y: i32) {
        self.nodes.push(CanonicalNode::new(text, x0, y, 40, TICK_HEIGHT));
    }

    fn expect(&mut self, field: &str, value: &str) {
        self.expected.retain(|(name, _)| name != field);
        self.expected.push((field.to_string(), value.to_string()));
    }

    fn labelled(&mut self, field: &str, label: &str, y: i32, value: &str) {
        self.push_label(label, 100, y);
        self.push_value(value, 420, y);
        self.expect(field, value);
    }

    /// Removes every node with exactly this text.
    pub fn without_text(mut self, text: &str) -> Self {
        self.nodes.retain(|node| node.text != text);
        self
    }

    /// Adds a free node in canonical coordinates.
    pub fn with_node(mut self, text: &str, x0: i32, y_center: i32, width: i32, height: i32) -> Self {
        self.nodes.push(CanonicalNode::new(text, x0, y_center, width, height));
        self
    }

    /// Expected value per field name.
    pub fn expected(&self) -> &[(String, String)] {
        &self.expected
    }

    pub fn expected_value(&self, field: &str) -> Option<&str> {
        self.expected
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| value.as_str())
    }

    /// Nodes as the recognizer would report them at working height `height`.
    pub fn nodes(&self, height: u32) -> Vec<TextNode> {
        self.nodes.iter().map(|node| node.scaled(height)).collect()
    }

    /// White page of working height `height` with the segment table ruled in black.
    pub fn render(&self, height: u32) -> GrayImage {
        let width = scale_coord(CANONICAL_WIDTH, height).max(1) as u32;
        let mut page = GrayImage::from_pixel(width, height, Luma([255]));
        let s = |v: i32| scale_coord(v, height);
        let thickness = s(3).max(2) as u32;
        let ink = Luma([0u8]);

        for y in [TABLE_TOP, TABLE_BOTTOM] {
            draw_filled_rect_mut(
                &mut page,
                Rect::at(s(TABLE_LEFT), s(y)).of_size((s(TABLE_RIGHT) - s(TABLE_LEFT)) as u32, thickness),
                ink,
            );
        }
        for x in [TABLE_LEFT, TABLE_MIDDLE, TABLE_RIGHT] {
            draw_filled_rect_mut(
                &mut page,
                Rect::at(s(x), s(TABLE_TOP)).of_size(thickness, (s(TABLE_BOTTOM) - s(TABLE_TOP)) as u32),
                ink,
            );
        }
        page
    }
}

/// Recognizer returning fixed nodes whatever the page.
pub struct StubRecognizer {
    nodes: Vec<TextNode>,
    delay: Option<Duration>,
}

impl StubRecognizer {
    pub fn new(nodes: Vec<TextNode>) -> Self {
        Self { nodes, delay: None }
    }

    /// Sleeps before answering, to exercise caller-side timeouts.
    pub fn slow(nodes: Vec<TextNode>, delay: Duration) -> Self {
        Self {
            nodes,
            delay: Some(delay),
        }
    }
}

impl Recognizer for StubRecognizer {
    fn name(&self) -> &str {
        "stub"
    }

    fn recognize(&self, _image: &DynamicImage) -> InBodyResult<Vec<TextNode>> {
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        Ok(self.nodes.clone())
    }
}

/// Engine at working height `height` answering with the nodes of `report`.
pub fn matcher_for(report: &SyntheticReport, height: u32) -> InBodyMatcher {
    let config = ExtractionConfig {
        target_height: height,
        ..Default::default()
    };
    InBodyMatcher::new(
        config,
        FieldCatalog::inbody_default(),
        Arc::new(StubRecognizer::new(report.nodes(height))),
    )
    .expect("valid test configuration")
}

/// Share of expected fields whose extracted value matches.
pub fn accuracy(result: &inbody_extract::ExtractionResult, report: &SyntheticReport) -> f64 {
    let correct = report
        .expected()
        .iter()
        .filter(|(field, value)| result.value(field) == Some(value.as_str()))
        .count();
    correct as f64 / report.expected().len() as f64
}
