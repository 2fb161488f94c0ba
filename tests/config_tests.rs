//! # Configuration Tests Module
//!
//! Loading, validation and serialization of the extraction, recognition and
//! observability settings.

#[cfg(test)]
mod tests {
    use inbody_extract::config::ExtractionConfig;
    use inbody_extract::observability_config::{presets, ObservabilityConfig};
    use inbody_extract::ocr_config::{OcrConfig, PageSegMode};
    use inbody_extract::InBodyError;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_match_documented_inputs() {
        let config = ExtractionConfig::default();
        assert_eq!(config.target_height, 2400);
        assert!(config.auto_perspective);
        assert_eq!(config.skew_threshold, 15.0);
        assert_eq!(config.ocr.languages, "kor+eng");
        assert_eq!(config.ocr.psm_mode, PageSegMode::SparseText);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_environment_gives_defaults() {
        let config = ExtractionConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, ExtractionConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ExtractionConfig::from_lookup(lookup(&[
            ("INBODY_TARGET_HEIGHT", "960"),
            ("INBODY_TIMEOUT_SECS", "5"),
            ("INBODY_OCR_LANGUAGES", "kor"),
        ]))
        .unwrap();

        assert_eq!(config.target_height, 960);
        assert_eq!(config.operation_timeout_secs, 5);
        assert_eq!(config.ocr.languages, "kor");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_out_of_range_values_fail_validation() {
        let config = ExtractionConfig::from_lookup(lookup(&[("INBODY_TARGET_HEIGHT", "20000")]))
            .unwrap();
        assert!(matches!(config.validate(), Err(InBodyError::Configuration(_))));

        let config = ExtractionConfig::from_lookup(lookup(&[("INBODY_SKEW_THRESHOLD", "-1")]))
            .unwrap();
        assert!(config.validate().is_err());

        let config = ExtractionConfig {
            ocr: OcrConfig {
                languages: "kor+".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = ExtractionConfig {
            target_height: 1200,
            auto_perspective: false,
            ..Default::default()
        };
        let json = serde_json::to_string(&config).unwrap();
        let back: ExtractionConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_summary_mentions_key_settings() {
        let summary = ExtractionConfig::default().summary();
        assert!(summary.contains("target_height=2400"));
        assert!(summary.contains("ocr_languages=kor+eng"));
    }

    #[test]
    fn test_observability_presets_are_valid() {
        for config in [
            ObservabilityConfig::default(),
            presets::development(),
            presets::production(),
            presets::minimal(),
        ] {
            assert!(config.validate().is_ok(), "{:?}", config);
        }
    }
}
