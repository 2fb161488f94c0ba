//! # Extraction Orchestrator
//!
//! [`InBodyMatcher`] runs one report through the whole pipeline:
//!
//! ```text
//! Init -> Preprocessed -> Recognized -> TableLocated -> Matched -> Done
//! ```
//!
//! Only configuration, image loading and recognition failures abort a call.
//! Everything else degrades: an uncorrectable skew keeps the original page,
//! a missing table falls back to the scaled layout constants and a missing
//! field becomes the "not detected" sentinel.

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use image::DynamicImage;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use tracing::{debug, info};

use crate::config::ExtractionConfig;
use crate::errors::{error_logging, InBodyError, InBodyResult};
use crate::field_matcher::{FieldMatcher, FieldValue};
use crate::fields::FieldCatalog;
use crate::matching_params::{MatchingParameters, ScaledMatchingParameters};
use crate::observability;
use crate::ocr::{self, Recognizer, TextNode};
use crate::preprocessing::{resize_to_height, Correction, Preprocessor};
use crate::scale::ScaleManager;
use crate::table_locator::{BoundsSource, TableBounds, TableLocator};

/// Pipeline stage of one extraction call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ExtractionStage {
    Init,
    Preprocessed,
    Recognized,
    TableLocated,
    Matched,
    Done,
}

impl ExtractionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionStage::Init => "init",
            ExtractionStage::Preprocessed => "preprocessed",
            ExtractionStage::Recognized => "recognized",
            ExtractionStage::TableLocated => "table_located",
            ExtractionStage::Matched => "matched",
            ExtractionStage::Done => "done",
        }
    }

    /// The stage that follows this one; `Done` is terminal.
    pub fn next(self) -> Self {
        match self {
            ExtractionStage::Init => ExtractionStage::Preprocessed,
            ExtractionStage::Preprocessed => ExtractionStage::Recognized,
            ExtractionStage::Recognized => ExtractionStage::TableLocated,
            ExtractionStage::TableLocated => ExtractionStage::Matched,
            ExtractionStage::Matched | ExtractionStage::Done => ExtractionStage::Done,
        }
    }
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Moves `stage` forward one step and logs the transition.
fn advance(stage: &mut ExtractionStage) {
    let next = stage.next();
    debug!(from = stage.as_str(), to = next.as_str(), "Extraction stage transition");
    *stage = next;
}

/// How the page was handled on its way to the matcher.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionDiagnostics {
    pub skew_angle: Option<f32>,
    pub correction: Correction,
    /// Why geometric correction was skipped, when it was
    pub degraded: Option<String>,
    pub working_height: u32,
    pub scale_ratio: f64,
    pub table: TableBounds,
    pub node_count: usize,
    pub processing_time_ms: u64,
}

/// Field values of one report, in catalog order.
///
/// Serializes as a flat JSON object: detected values as strings, attempted
/// but missing fields as the sentinel and skipped fields as `null`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionResult {
    fields: Vec<(String, FieldValue)>,
    diagnostics: ExtractionDiagnostics,
}

impl ExtractionResult {
    pub fn new(fields: Vec<(String, FieldValue)>, diagnostics: ExtractionDiagnostics) -> Self {
        Self {
            fields,
            diagnostics,
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    /// Detected value of a field, if any.
    pub fn value(&self, name: &str) -> Option<&str> {
        match self.get(name) {
            Some(FieldValue::Detected(value)) => Some(value),
            _ => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn diagnostics(&self) -> &ExtractionDiagnostics {
        &self.diagnostics
    }

    pub fn detected_count(&self) -> usize {
        self.fields.iter().filter(|(_, v)| v.is_detected()).count()
    }

    pub fn attempted_count(&self) -> usize {
        self.fields.iter().filter(|(_, v)| v.is_attempted()).count()
    }

    /// Share of attempted fields that were detected; `0.0` when nothing was attempted.
    pub fn detection_rate(&self) -> f64 {
        let attempted = self.attempted_count();
        if attempted == 0 {
            return 0.0;
        }
        self.detected_count() as f64 / attempted as f64
    }
}

impl Serialize for ExtractionResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Extraction engine for one configuration and field catalog.
///
/// Holds no mutable state; one instance can serve concurrent calls.
#[derive(Clone)]
pub struct InBodyMatcher {
    config: ExtractionConfig,
    catalog: FieldCatalog,
    recognizer: Arc<dyn Recognizer>,
    scale: ScaleManager,
    params: ScaledMatchingParameters,
    preprocessor: Preprocessor,
}

impl fmt::Debug for InBodyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InBodyMatcher")
            .field("config", &self.config)
            .field("fields", &self.catalog.len())
            .field("recognizer", &self.recognizer.name())
            .field("scale_ratio", &self.scale.scale_ratio())
            .finish()
    }
}

impl InBodyMatcher {
    /// Validates the configuration and catalog and derives the scaled parameters.
    ///
    /// # Errors
    ///
    /// `InBodyError::Configuration` for any invalid setting.
    pub fn new(
        config: ExtractionConfig,
        catalog: FieldCatalog,
        recognizer: Arc<dyn Recognizer>,
    ) -> InBodyResult<Self> {
        let validated = config
            .validate()
            .and_then(|_| catalog.validate())
            .and_then(|_| MatchingParameters::CANONICAL.validate());
        if let Err(e) = validated {
            error_logging::log_config_error(&e, "extraction_config", "matcher_init");
            return Err(e);
        }

        let scale = ScaleManager::canonical(i64::from(config.target_height))?;
        let params = MatchingParameters::CANONICAL.scale(&scale);
        let preprocessor = Preprocessor::new(config.perspective());

        info!(
            target_height = config.target_height,
            scale_ratio = scale.scale_ratio(),
            fields = catalog.len(),
            recognizer = recognizer.name(),
            "Extraction engine initialized"
        );

        Ok(Self {
            config,
            catalog,
            recognizer,
            scale,
            params,
            preprocessor,
        })
    }

    /// Engine with the default catalog and a Tesseract backend.
    #[cfg(feature = "tesseract")]
    pub fn with_tesseract(config: ExtractionConfig) -> InBodyResult<Self> {
        let recognizer = ocr::TesseractRecognizer::new(config.ocr.clone())?;
        Self::new(config, FieldCatalog::inbody_default(), Arc::new(recognizer))
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn catalog(&self) -> &FieldCatalog {
        &self.catalog
    }

    pub fn params(&self) -> &ScaledMatchingParameters {
        &self.params
    }

    pub fn scale(&self) -> &ScaleManager {
        &self.scale
    }

    /// Loads a report photo from disk and extracts every field.
    pub fn extract_and_match(&self, path: &Path) -> InBodyResult<ExtractionResult> {
        let source = path.display().to_string();
        let image = ocr::load_image_file(path, &self.config.ocr).map_err(|e| {
            error_logging::log_extraction_error(&e, ExtractionStage::Init.as_str(), Some(&source), None);
            observability::record_extraction_metrics(false, Duration::ZERO);
            e
        })?;
        self.run(&image, &source)
    }

    /// Decodes an in-memory report photo and extracts every field.
    pub fn extract_and_match_bytes(&self, bytes: &[u8]) -> InBodyResult<ExtractionResult> {
        let image = ocr::decode_image(bytes, &self.config.ocr).map_err(|e| {
            error_logging::log_extraction_error(&e, ExtractionStage::Init.as_str(), None, None);
            observability::record_extraction_metrics(false, Duration::ZERO);
            e
        })?;
        self.run(&image, "<memory>")
    }

    /// Extracts every field from an already decoded page.
    pub fn extract_from_image(&self, image: &DynamicImage) -> InBodyResult<ExtractionResult> {
        self.run(image, "<image>")
    }

    /// Matches fields against recognized nodes without any imaging.
    ///
    /// `image_height` is the height of the page the nodes were read from; the
    /// matching parameters are scaled to it.
    pub fn match_nodes(
        &self,
        nodes: &[TextNode],
        image_height: u32,
        table: &TableBounds,
    ) -> InBodyResult<ExtractionResult> {
        let start_time = Instant::now();
        let scale = ScaleManager::canonical(i64::from(image_height))?;
        let params = MatchingParameters::CANONICAL.scale(&scale);

        let fields = FieldMatcher::new(&self.catalog, &params, self.config.template_revision)
            .extract_all(nodes, table);

        let result = ExtractionResult::new(
            fields,
            ExtractionDiagnostics {
                skew_angle: None,
                correction: Correction::None,
                degraded: None,
                working_height: image_height,
                scale_ratio: scale.scale_ratio(),
                table: *table,
                node_count: nodes.len(),
                processing_time_ms: start_time.elapsed().as_millis() as u64,
            },
        );
        self.record_success(&result, start_time.elapsed());
        Ok(result)
    }

    fn run(&self, image: &DynamicImage, source: &str) -> InBodyResult<ExtractionResult> {
        let span = observability::extraction_span(source, self.config.target_height);
        let _guard = span.enter();
        let start_time = Instant::now();
        let mut stage = ExtractionStage::Init;

        let outcome = self.preprocessor.correct(image);
        advance(&mut stage);

        let recognized = resize_to_height(&outcome.image, self.scale.target_height())
            .map_err(|e| InBodyError::Configuration(e.to_string()))
            .and_then(|scaled| {
                let nodes = self.recognizer.recognize(&scaled.image)?;
                Ok((scaled.image, nodes))
            });
        let (working, nodes) = match recognized {
            Ok(value) => value,
            Err(e) => {
                error_logging::log_extraction_error(
                    &e,
                    stage.as_str(),
                    Some(source),
                    Some(start_time.elapsed()),
                );
                observability::record_extraction_metrics(false, start_time.elapsed());
                return Err(e);
            }
        };
        ocr::log_recognition_summary(self.recognizer.as_ref(), &nodes);
        advance(&mut stage);

        let table = TableLocator::locate_segment_table(&working.to_luma8(), &self.params);
        if table.source == BoundsSource::Fallback {
            debug!(
                y_min = table.y_min,
                y_max = table.y_max,
                "Segment table not found, using scaled layout constants"
            );
        }
        advance(&mut stage);

        let fields = FieldMatcher::new(&self.catalog, &self.params, self.config.template_revision)
            .extract_all(&nodes, &table);
        advance(&mut stage);

        let result = ExtractionResult::new(
            fields,
            ExtractionDiagnostics {
                skew_angle: outcome.skew_angle,
                correction: outcome.correction,
                degraded: outcome.degraded.map(|e| e.to_string()),
                working_height: working.height(),
                scale_ratio: self.scale.scale_ratio(),
                table,
                node_count: nodes.len(),
                processing_time_ms: start_time.elapsed().as_millis() as u64,
            },
        );
        advance(&mut stage);

        info!(
            stage = stage.as_str(),
            detected = result.detected_count(),
            attempted = result.attempted_count(),
            detection_rate = result.detection_rate(),
            duration_ms = start_time.elapsed().as_millis() as u64,
            "Extraction finished"
        );
        self.record_success(&result, start_time.elapsed());
        Ok(result)
    }

    fn record_success(&self, result: &ExtractionResult, duration: Duration) {
        let skipped = result.len() - result.attempted_count();
        observability::record_extraction_metrics(true, duration);
        observability::record_field_metrics(
            result.detected_count(),
            result.attempted_count() - result.detected_count(),
            skipped,
            result.detection_rate(),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::BBox;

    struct FixedRecognizer(Vec<TextNode>);

    impl Recognizer for FixedRecognizer {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &DynamicImage) -> InBodyResult<Vec<TextNode>> {
            Ok(self.0.clone())
        }
    }

    struct FailingRecognizer;

    impl Recognizer for FailingRecognizer {
        fn name(&self) -> &str {
            "failing"
        }

        fn recognize(&self, _image: &DynamicImage) -> InBodyResult<Vec<TextNode>> {
            Err(InBodyError::Recognition("engine unavailable".to_string()))
        }
    }

    fn matcher(recognizer: impl Recognizer + 'static) -> InBodyMatcher {
        let config = ExtractionConfig {
            auto_perspective: false,
            ..Default::default()
        };
        InBodyMatcher::new(config, FieldCatalog::inbody_default(), Arc::new(recognizer)).unwrap()
    }

    #[test]
    fn test_stage_order() {
        let mut stage = ExtractionStage::Init;
        let mut seen = vec![stage];
        while stage != ExtractionStage::Done {
            advance(&mut stage);
            seen.push(stage);
        }
        assert_eq!(seen.len(), 6);
        assert!(seen.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(ExtractionStage::Done.next(), ExtractionStage::Done);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExtractionConfig {
            target_height: 0,
            ..Default::default()
        };
        let result = InBodyMatcher::new(
            config,
            FieldCatalog::inbody_default(),
            Arc::new(FixedRecognizer(vec![])),
        );
        assert!(matches!(result, Err(InBodyError::Configuration(_))));
    }

    #[test]
    fn test_recognition_failure_aborts() {
        let engine = matcher(FailingRecognizer);
        let image = DynamicImage::new_luma8(200, 300);
        let err = engine.extract_from_image(&image).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_empty_page_yields_sentinels() {
        let engine = matcher(FixedRecognizer(vec![]));
        let image = DynamicImage::new_luma8(200, 300);
        let result = engine.extract_from_image(&image).unwrap();

        assert_eq!(result.len(), engine.catalog().len());
        assert_eq!(result.detected_count(), 0);
        assert_eq!(result.detection_rate(), 0.0);
        assert_eq!(result.diagnostics().working_height, 2400);
        assert_eq!(result.get("weight"), Some(&FieldValue::NotDetected));
    }

    #[test]
    fn test_match_nodes_and_serialization_order() {
        let engine = matcher(FixedRecognizer(vec![]));
        let nodes = vec![
            TextNode::new("체중", BBox::new(100, 700, 180, 740)),
            TextNode::new("72.4", BBox::new(400, 698, 480, 742)),
        ];
        let table = TableBounds::fallback(1700, engine.params());
        let result = engine.match_nodes(&nodes, 2400, &table).unwrap();

        assert_eq!(result.value("weight"), Some("72.4"));
        assert!(result.detection_rate() > 0.0);

        let json = serde_json::to_string(&result).unwrap();
        let first_key = engine.catalog().fields[0].name.as_str();
        assert!(json.starts_with(&format!("{{\"{}\":", first_key)));
        assert!(json.contains("\"weight\":\"72.4\""));
    }

    #[test]
    fn test_matcher_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<InBodyMatcher>();
    }
}
