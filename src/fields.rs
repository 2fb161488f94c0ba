//! # Field Catalog
//!
//! Declarative description of every value read from the report: which label
//! anchors it, where the value sits relative to that label and how it is
//! parsed. The built-in catalog covers the standard result sheet; a catalog
//! can also be loaded from JSON.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{InBodyError, InBodyResult};
use crate::matching_params::ScaledMatchingParameters;
use crate::table_locator::TableHalf;

/// Latest report template revision known to the built-in catalog.
pub const CURRENT_TEMPLATE_REVISION: u32 = 2;

/// Where the value is printed relative to its label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Right,
    Left,
    Below,
}

/// How the winning text is parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// Decimal number such as `72.4`
    Decimal,
    /// Whole number such as `1523`
    Integer,
    /// One of the three reference-range grades
    Grade,
}

/// Part of the page the anchor and value must lie in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchRegion {
    #[default]
    Page,
    SegmentTable(TableHalf),
}

/// Approximate vertical position of a label, used to pick among repeated labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionRef {
    MuscleFat,
    BodyFatLine,
    Metabolism,
    SegmentTop,
    SegmentBottom,
    /// Arbitrary row on the canonical 2400 px page
    Canonical(i32),
}

impl PositionRef {
    /// Row in working-image pixels.
    pub fn resolve(&self, params: &ScaledMatchingParameters) -> i32 {
        let p = &params.position;
        match *self {
            PositionRef::MuscleFat => p.muscle_fat_y,
            PositionRef::BodyFatLine => p.body_fat_line_y,
            PositionRef::Metabolism => p.metabolism_y,
            PositionRef::SegmentTop => p.segment_y_min,
            PositionRef::SegmentBottom => p.segment_y_max,
            PositionRef::Canonical(y) => (f64::from(y) * params.scale_ratio).floor() as i32,
        }
    }
}

fn default_revision() -> u32 {
    1
}

/// One extracted field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Key in the result map
    pub name: String,
    /// Printed label that anchors the value
    pub keyword: String,
    /// Alternative spellings of the label (English sheets, older templates)
    #[serde(default)]
    pub aliases: Vec<String>,
    pub direction: Direction,
    pub value_kind: ValueKind,
    #[serde(default)]
    pub region: SearchRegion,
    #[serde(default)]
    pub anchor_hint: Option<PositionRef>,
    /// First template revision that prints this field
    #[serde(default = "default_revision")]
    pub min_revision: u32,
}

impl FieldDefinition {
    pub fn new(
        name: &str,
        keyword: &str,
        direction: Direction,
        value_kind: ValueKind,
    ) -> Self {
        Self {
            name: name.to_string(),
            keyword: keyword.to_string(),
            aliases: Vec::new(),
            direction,
            value_kind,
            region: SearchRegion::Page,
            anchor_hint: None,
            min_revision: default_revision(),
        }
    }

    pub fn with_aliases(mut self, aliases: &[&str]) -> Self {
        self.aliases = aliases.iter().map(|a| a.to_string()).collect();
        self
    }

    pub fn in_region(mut self, region: SearchRegion) -> Self {
        self.region = region;
        self
    }

    pub fn with_hint(mut self, hint: PositionRef) -> Self {
        self.anchor_hint = Some(hint);
        self
    }

    pub fn since_revision(mut self, revision: u32) -> Self {
        self.min_revision = revision;
        self
    }

    /// The keyword followed by its aliases.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.keyword.as_str()).chain(self.aliases.iter().map(String::as_str))
    }
}

/// Ordered list of fields; result maps follow this order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldCatalog {
    pub fields: Vec<FieldDefinition>,
}

/// Body parts of the segmental table, top to bottom.
pub const BODY_PARTS: [(&str, &str, &str); 5] = [
    ("right_arm", "오른팔", "Right Arm"),
    ("left_arm", "왼팔", "Left Arm"),
    ("trunk", "몸통", "Trunk"),
    ("right_leg", "오른다리", "Right Leg"),
    ("left_leg", "왼다리", "Left Leg"),
];

impl FieldCatalog {
    pub fn new(fields: Vec<FieldDefinition>) -> InBodyResult<Self> {
        let catalog = Self { fields };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Fields of the standard result sheet.
    pub fn inbody_default() -> Self {
        use Direction::*;
        use ValueKind::*;

        let mut fields = vec![
            FieldDefinition::new("total_body_water", "체수분", Right, Decimal)
                .with_aliases(&["Total Body Water"]),
            FieldDefinition::new("protein", "단백질", Right, Decimal).with_aliases(&["Protein"]),
            FieldDefinition::new("minerals", "무기질", Right, Decimal).with_aliases(&["Minerals"]),
            FieldDefinition::new("weight", "체중", Right, Decimal)
                .with_aliases(&["Weight"])
                .with_hint(PositionRef::Canonical(720)),
            FieldDefinition::new("skeletal_muscle_mass", "골격근량", Right, Decimal)
                .with_aliases(&["SMM"])
                .with_hint(PositionRef::MuscleFat),
            FieldDefinition::new("body_fat_mass", "체지방량", Right, Decimal)
                .with_aliases(&["Body Fat Mass"])
                .with_hint(PositionRef::Canonical(840)),
            FieldDefinition::new("bmi", "BMI", Right, Decimal)
                .with_aliases(&["신체질량지수"])
                .with_hint(PositionRef::Canonical(1060)),
            FieldDefinition::new("percent_body_fat", "체지방률", Right, Decimal)
                .with_aliases(&["PBF"])
                .with_hint(PositionRef::BodyFatLine),
            FieldDefinition::new("inbody_score", "인바디점수", Below, Integer)
                .with_aliases(&["InBody Score"]),
        ];

        for (half, quantity) in [(TableHalf::Left, "muscle"), (TableHalf::Right, "fat")] {
            for (part, label, english) in BODY_PARTS {
                let region = SearchRegion::SegmentTable(half);
                fields.push(
                    FieldDefinition::new(&format!("{}_{}", part, quantity), label, Right, Decimal)
                        .with_aliases(&[english])
                        .in_region(region),
                );
                fields.push(
                    FieldDefinition::new(&format!("{}_{}_grade", part, quantity), label, Below, Grade)
                        .with_aliases(&[english])
                        .in_region(region),
                );
            }
        }

        fields.extend([
            FieldDefinition::new("basal_metabolic_rate", "기초대사량", Right, Integer)
                .with_aliases(&["BMR"])
                .with_hint(PositionRef::Metabolism),
            FieldDefinition::new("visceral_fat_level", "내장지방레벨", Right, Integer)
                .with_aliases(&["Visceral Fat Level"])
                .with_hint(PositionRef::Canonical(2170))
                .since_revision(2),
            FieldDefinition::new("waist_hip_ratio", "복부지방률", Right, Decimal)
                .with_aliases(&["WHR"])
                .with_hint(PositionRef::Canonical(2240))
                .since_revision(2),
        ]);

        Self { fields }
    }

    /// Parses and validates a catalog from JSON.
    pub fn from_json_str(json: &str) -> InBodyResult<Self> {
        let catalog: FieldCatalog = serde_json::from_str(json)?;
        catalog.validate()?;
        Ok(catalog)
    }

    pub fn from_json_file(path: &Path) -> InBodyResult<Self> {
        let json = std::fs::read_to_string(path).map_err(|e| {
            InBodyError::Configuration(format!(
                "cannot read field catalog {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::from_json_str(&json)
    }

    /// Names must be unique and non-empty; every label must contain text.
    pub fn validate(&self) -> InBodyResult<()> {
        if self.fields.is_empty() {
            return Err(InBodyError::Configuration(
                "field catalog is empty".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(InBodyError::Configuration(
                    "field name must not be empty".to_string(),
                ));
            }
            if !names.insert(field.name.as_str()) {
                return Err(InBodyError::Configuration(format!(
                    "duplicate field name '{}'",
                    field.name
                )));
            }
            if field.labels().any(|l| crate::text_matching::normalize_label(l).is_empty()) {
                return Err(InBodyError::Configuration(format!(
                    "field '{}' has an empty keyword or alias",
                    field.name
                )));
            }
            if field.min_revision == 0 {
                return Err(InBodyError::Configuration(format!(
                    "field '{}' has min_revision 0",
                    field.name
                )));
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every distinct label in the catalog, used to keep labels out of the value candidates.
    pub fn all_labels(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.fields
            .iter()
            .flat_map(FieldDefinition::labels)
            .filter(|l| seen.insert(*l))
            .collect()
    }
}

impl Default for FieldCatalog {
    fn default() -> Self {
        Self::inbody_default()
    }
}
