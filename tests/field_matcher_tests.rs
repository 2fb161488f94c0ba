//! # Field Matcher Tests Module
//!
//! Anchor search, regions of interest, candidate scoring and custom field
//! catalogs through the public matching API.

#[cfg(test)]
mod tests {
    use inbody_extract::field_matcher::{
        find_anchor, looks_like_scale_mark, match_field, region_of_interest, FieldMatcher,
        FieldValue, MatchContext,
    };
    use inbody_extract::fields::{Direction, FieldCatalog, FieldDefinition, SearchRegion, ValueKind};
    use inbody_extract::matching_params::{MatchingParameters, ScaledMatchingParameters};
    use inbody_extract::ocr::{BBox, TextNode};
    use inbody_extract::scale::ScaleManager;
    use inbody_extract::table_locator::{BoundsSource, TableBounds, TableHalf};
    use inbody_extract::InBodyError;

    fn node(text: &str, x0: i32, y0: i32, x1: i32, y1: i32) -> TextNode {
        TextNode::new(text, BBox::new(x0, y0, x1, y1))
    }

    fn params_at(height: i64) -> ScaledMatchingParameters {
        MatchingParameters::CANONICAL.scale(&ScaleManager::canonical(height).unwrap())
    }

    fn page_table() -> TableBounds {
        TableBounds {
            x_min: 40,
            x_max: 1660,
            y_min: 1400,
            y_max: 1900,
            source: BoundsSource::Detected,
        }
    }

    #[test]
    fn test_right_roi_is_clipped_to_drift_bound() {
        let params = params_at(2400);
        let anchor = node("체중", 100, 700, 180, 740);
        let roi = region_of_interest(&anchor, Direction::Right, &params);

        assert_eq!(roi.x0, 190);
        assert_eq!(roi.x1, 1180);
        assert_eq!(roi.y0, 680);
        assert_eq!(roi.y1, 760);
    }

    #[test]
    fn test_left_roi_mirrors_right() {
        let params = params_at(2400);
        let anchor = node("kg", 900, 700, 960, 740);
        let roi = region_of_interest(&anchor, Direction::Left, &params);

        assert_eq!(roi.x0, 300);
        assert_eq!(roi.x1, 890);
        assert!(roi.contains((600, 720)));
        assert!(!roi.contains((950, 720)));
    }

    #[test]
    fn test_below_roi_starts_under_anchor_centre() {
        let params = params_at(1200);
        let anchor = node("인바디점수", 650, 615, 730, 635);
        let roi = region_of_interest(&anchor, Direction::Below, &params);

        // roi_y_margin (15) reaches past the centre, so the band opens just under it
        assert_eq!(roi.y0, 626);
        assert_eq!(roi.y1, 625 + 80);
        assert_eq!(roi.x0, 690 - 75);
        assert_eq!(roi.x1, 690 + 75);
    }

    #[test]
    fn test_anchor_tolerates_recognition_noise() {
        let params = params_at(2400);
        let table = page_table();
        let labels = ["골격근량"];
        let ctx = MatchContext {
            params: &params,
            table: &table,
            labels: &labels,
        };
        let field = FieldDefinition::new("smm", "골격근량", Direction::Right, ValueKind::Decimal);

        let nodes = vec![node("골격근랑", 100, 760, 260, 800)];
        assert!(find_anchor(&nodes, &field, &ctx).is_some());

        let nodes = vec![node("기초대사량", 100, 760, 300, 800)];
        assert!(find_anchor(&nodes, &field, &ctx).is_none());
    }

    #[test]
    fn test_segment_half_disambiguates_repeated_labels() {
        let params = params_at(2400);
        let table = page_table();
        let labels = ["몸통"];
        let ctx = MatchContext {
            params: &params,
            table: &table,
            labels: &labels,
        };
        let nodes = vec![
            node("몸통", 80, 1610, 160, 1650),
            node("24.8", 300, 1608, 400, 1652),
            node("몸통", 890, 1610, 970, 1650),
            node("7.6", 1110, 1608, 1210, 1652),
        ];

        let muscle = FieldDefinition::new("trunk_muscle", "몸통", Direction::Right, ValueKind::Decimal)
            .in_region(SearchRegion::SegmentTable(TableHalf::Left));
        let fat = FieldDefinition::new("trunk_fat", "몸통", Direction::Right, ValueKind::Decimal)
            .in_region(SearchRegion::SegmentTable(TableHalf::Right));

        assert_eq!(match_field(&nodes, &muscle, &ctx).unwrap(), "24.8");
        assert_eq!(match_field(&nodes, &fat, &ctx).unwrap(), "7.6");
    }

    #[test]
    fn test_scale_mark_needs_a_row_of_integers() {
        let params = params_at(2400);
        let ticks = vec![
            node("70", 700, 768, 740, 792),
            node("85", 820, 768, 860, 792),
            node("100", 940, 768, 990, 792),
        ];
        assert!(looks_like_scale_mark(&ticks[0], &ticks, &params));

        let lonely = vec![node("70", 700, 768, 740, 792)];
        assert!(!looks_like_scale_mark(&lonely[0], &lonely, &params));

        let printed = vec![
            node("1523", 420, 2078, 520, 2122),
            node("85", 820, 2088, 860, 2112),
            node("100", 940, 2088, 990, 2112),
        ];
        assert!(!looks_like_scale_mark(&printed[0], &printed, &params));
    }

    #[test]
    fn test_unparsable_winner_is_value_parse_error() {
        let params = params_at(2400);
        let table = page_table();
        let labels = ["기초대사량"];
        let ctx = MatchContext {
            params: &params,
            table: &table,
            labels: &labels,
        };
        let field = FieldDefinition::new("bmr", "기초대사량", Direction::Right, ValueKind::Integer);
        let nodes = vec![
            node("기초대사량", 100, 2080, 300, 2120),
            node("15.23", 420, 2078, 520, 2122),
        ];

        let err = match_field(&nodes, &field, &ctx).unwrap_err();
        assert!(matches!(err, InBodyError::ValueParse { .. }));
    }

    #[test]
    fn test_custom_catalog_from_json() {
        let json = r#"{
            "fields": [
                {"name": "weight", "keyword": "Weight", "direction": "right", "value_kind": "decimal"},
                {"name": "score", "keyword": "Score", "direction": "below", "value_kind": "integer",
                 "min_revision": 2}
            ]
        }"#;
        let catalog = FieldCatalog::from_json_str(json).unwrap();
        assert_eq!(catalog.len(), 2);

        let params = params_at(2400);
        let nodes = vec![
            node("Weight", 100, 700, 220, 740),
            node("68.0", 420, 698, 520, 742),
            node("Score", 1300, 1230, 1420, 1270),
            node("81", 1340, 1298, 1390, 1342),
        ];
        let table = TableBounds::fallback(1700, &params);

        let current = FieldMatcher::new(&catalog, &params, 2).extract_all(&nodes, &table);
        assert_eq!(
            current,
            vec![
                ("weight".to_string(), FieldValue::Detected("68.0".to_string())),
                ("score".to_string(), FieldValue::Detected("81".to_string())),
            ]
        );

        let older = FieldMatcher::new(&catalog, &params, 1).extract_all(&nodes, &table);
        assert_eq!(older[1].1, FieldValue::Skipped);
    }

    #[test]
    fn test_invalid_catalog_is_rejected() {
        let duplicate = r#"{"fields": [
            {"name": "weight", "keyword": "체중", "direction": "right", "value_kind": "decimal"},
            {"name": "weight", "keyword": "Weight", "direction": "right", "value_kind": "decimal"}
        ]}"#;
        assert!(matches!(
            FieldCatalog::from_json_str(duplicate),
            Err(InBodyError::Configuration(_))
        ));
        assert!(FieldCatalog::from_json_str("not json").is_err());
    }
}
