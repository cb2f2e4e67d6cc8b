use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use recon_ingest::{
    DataTypeMap, DdlColumnExtractor, DocumentationOptions, FqdnResolver, IngestError, PageCatalog,
    SnapshotCatalog,
};
use recon_map::{
    Collaborators, EngineConfig, FixedClock, JsonMappingRepository, MappingStore, MatcherConfig,
    ReconciliationEngine,
};
use recon_model::{MappingKey, MappingStatus, MatchStrategy, ObjectKind};

const PAGES: &str = r#"{"pages": [
  {"page_id": "9001", "title": "Security Master", "verified": true, "tables": [
    {"id": "table_1", "columns": [
      {"source_table": "sec_master", "source_field_name": "CUSIP_ID", "target_field_name": "CUSIP",
       "data_type": "varchar(9)", "add_source_to_target": "Yes"},
      {"source_table": "sec_master", "target_field_name": "ISSUER_NM",
       "data_type": "String", "add_source_to_target": true},
      {"source_table": "sec_master", "target_field_name": "LEGACY_CODE",
       "add_source_to_target": "No"}
    ]}
  ]}
]}"#;

const RESOLVER: &str = r#"{"sources": {
  "SECURITY_MASTER": {
    "aliases": ["SEC_MASTER"],
    "default": {"fqdn": "ANALYTICS_{ENV}.CORE.SECURITY_MASTER", "object_kind": "VIEW"}
  }
}}"#;

const DEFINITIONS: &str = r#"[
  {"fqdn": "ANALYTICS_DEV.CORE.SECURITY_MASTER", "environment": "DEV", "object_kind": "VIEW",
   "ddl": "CREATE OR REPLACE TABLE ANALYTICS_DEV.CORE.SECURITY_MASTER (CUSIP VARCHAR(9), ISSUER_NAME VARCHAR(200))"}
]"#;

const TYPES: &str = r#"{"STRING": "VARCHAR", "VARCHAR": "VARCHAR", "INTEGER": "NUMBER"}"#;

fn write(dir: &Path, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

#[test]
fn file_inputs_drive_a_full_run() {
    let dir = tempfile::tempdir().expect("temp dir");
    let pages = PageCatalog::load(
        &write(dir.path(), "pages.json", PAGES),
        &DocumentationOptions::default(),
    )
    .expect("pages");
    let resolver = FqdnResolver::load(&write(dir.path(), "fqdn.json", RESOLVER)).expect("resolver");
    let definitions =
        SnapshotCatalog::load(&write(dir.path(), "definitions.json", DEFINITIONS)).expect("defs");
    let types = DataTypeMap::load(&write(dir.path(), "types.json", TYPES)).expect("types");
    let extractor = DdlColumnExtractor;

    let config = EngineConfig::new(
        MatcherConfig::new(80, MatchStrategy::TokenSetRatio, false),
        ["DEV", "PROD"],
    )
    .unwrap();
    let engine = ReconciliationEngine::new(
        config,
        Collaborators {
            documentation: &pages,
            resolver: &resolver,
            definitions: &definitions,
            extractor: &extractor,
            types: Some(&types),
        },
    );

    let store_path = dir.path().join("mappings.json");
    let mut store = JsonMappingRepository::open(&store_path).expect("store");
    let clock = FixedClock(Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap());
    let report = engine.run(&mut store, &clock).expect("run");

    let counts = report.counts();
    assert_eq!(counts.mapped_exact, 1);
    assert_eq!(counts.mapped_fuzzy, 1);
    // PROD has a resolution but no definition snapshot.
    assert_eq!(counts.skipped, 2);
    assert!(!report.has_failures());

    let store = JsonMappingRepository::open(&store_path).expect("reopen");
    let key = |target: &str| {
        MappingKey::new(
            "9001",
            target,
            "ANALYTICS_DEV.CORE.SECURITY_MASTER",
            "DEV",
            ObjectKind::View,
        )
    };
    let cusip = store.get(&key("CUSIP")).unwrap().unwrap();
    assert_eq!(cusip.status, MappingStatus::MappedExact);
    assert!(cusip.notes.contains("resolves to VARCHAR(9)"));
    assert_eq!(cusip.ddl_hash_at_mapping.len(), 64);

    let issuer = store.get(&key("ISSUER_NM")).unwrap().unwrap();
    assert_eq!(issuer.matched_column.as_deref(), Some("ISSUER_NAME"));
    assert!(store.get(&key("LEGACY_CODE")).unwrap().is_none());
}

#[test]
fn missing_input_file_is_reported() {
    let dir = tempfile::tempdir().expect("temp dir");
    let err = FqdnResolver::load(&dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, IngestError::FileNotFound { .. }));
    let collaborator = err.into_unavailable("resolver");
    assert!(collaborator.is_unavailable());
}

#[test]
fn invalid_object_kind_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = write(
        dir.path(),
        "fqdn.json",
        r#"{"sources": {"A": {"default": {"fqdn": "X.Y.Z", "object_kind": "SYNONYM"}}}}"#,
    );
    assert!(matches!(
        FqdnResolver::load(&path),
        Err(IngestError::InvalidValue { .. })
    ));
}
