use chrono::{TimeZone, Utc};

use recon_model::{
    DocumentedPage, MappingKey, MappingRecord, MappingStatus, MatchStrategy, ModelError,
    ObjectKind, PhysicalColumn,
};

fn sample_key() -> MappingKey {
    MappingKey::new("1001", "ISSUER_NM", "ML_DEV.OPS.SECURITY", "DEV", ObjectKind::Table)
}

#[test]
fn strategy_names_parse_case_insensitively() {
    assert_eq!(
        "token_set_ratio".parse::<MatchStrategy>().unwrap(),
        MatchStrategy::TokenSetRatio
    );
    assert_eq!(
        "Partial Ratio".parse::<MatchStrategy>().unwrap(),
        MatchStrategy::PartialRatio
    );
    assert_eq!("WRatio".parse::<MatchStrategy>().unwrap(), MatchStrategy::WRatio);
    for strategy in MatchStrategy::ALL {
        assert_eq!(strategy.as_str().parse::<MatchStrategy>().unwrap(), strategy);
    }
}

#[test]
fn unknown_strategy_is_rejected() {
    let err = "SOUNDEX".parse::<MatchStrategy>().unwrap_err();
    assert_eq!(err, ModelError::UnknownStrategy("SOUNDEX".to_string()));
}

#[test]
fn object_kind_accepts_spaced_names() {
    assert_eq!(
        "materialized view".parse::<ObjectKind>().unwrap(),
        ObjectKind::MaterializedView
    );
    assert!("SEQUENCE".parse::<ObjectKind>().is_err());
}

#[test]
fn physical_column_names_are_upper_case() {
    let column = PhysicalColumn::new(" issuer_name ", "VARCHAR(100)");
    assert_eq!(column.name, "ISSUER_NAME");
}

#[test]
fn key_validation_rejects_blank_parts() {
    assert!(sample_key().validate().is_ok());
    let mut key = sample_key();
    key.environment = "  ".to_string();
    assert_eq!(
        key.validate().unwrap_err(),
        ModelError::EmptyKeyField("environment")
    );
}

#[test]
fn scope_round_trips_to_key() {
    let key = sample_key();
    assert_eq!(key.scope().key("ISSUER_NM"), key);
}

#[test]
fn record_serializes_flat_with_screaming_statuses() {
    let now = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
    let mut record = MappingRecord::new(sample_key(), now);
    record.status = MappingStatus::MappedFuzzy;
    record.match_strategy = Some(MatchStrategy::TokenSetRatio);
    record.match_score = Some(90.0);

    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["page_id"], "1001");
    assert_eq!(json["object_kind"], "TABLE");
    assert_eq!(json["status"], "MAPPED_FUZZY");
    assert_eq!(json["match_strategy"], "TOKEN_SET_RATIO");

    let back: MappingRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}

#[test]
fn documented_page_reads_parser_output() {
    let json = r#"{
        "page_id": "1001",
        "title": "Table: portfolio_ops",
        "columns": [
            {"source_table": "SEC_MASTER", "target_field_name": "CUSIP",
             "data_type": "VARCHAR(9)", "is_primary_key": true, "add_source_to_target": "Yes"},
            {"source_table": "SEC_MASTER", "target_field_name": "ISSUER_NM",
             "add_source_to_target": true},
            {"source_table": "SEC_MASTER", "target_field_name": "LEGACY_CD",
             "add_source_to_target": "no"},
            {"source_table": "SEC_MASTER", "target_field_name": "NOTES_TXT",
             "add_source_to_target": null},
            {"source_table": "SEC_MASTER", "target_field_name": "RANK_NO",
             "add_source_to_target": 1}
        ]
    }"#;
    let page: DocumentedPage = serde_json::from_str(json).unwrap();
    let included: Vec<_> = page
        .columns_to_map()
        .map(|c| c.target_field_name.as_str())
        .collect();
    assert_eq!(included, vec!["CUSIP", "ISSUER_NM"]);
    assert_eq!(page.documented_target_names().len(), 5);
    assert_eq!(page.columns[0].documented_type, "VARCHAR(9)");
    assert!(page.columns[0].is_primary_key);
}
