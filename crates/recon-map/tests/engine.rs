use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, TimeZone, Utc};
use recon_map::{
    Clock, CollaboratorError, Collaborators, ColumnExtractor, DefinitionSource,
    DocumentationSource, EngineConfig, FixedClock, InMemoryMappingStore, JsonMappingRepository,
    MappingStore,
    MatcherConfig, ReconError, ReconciliationEngine, RunReport, SkipReason, StoreError,
    TargetResolver, TypeResolver, UnitAction, set_override,
};
use recon_model::{
    DefinitionSnapshot, DocumentedColumn, DocumentedPage, MappingKey, MappingRecord, MappingScope,
    MappingStatus, MatchStrategy, ObjectKind, PhysicalColumn, PhysicalTarget,
};

const PAGE: &str = "4242";
const FQDN: &str = "ANALYTICS.CORE.SECURITY_MASTER";

/// In-memory stand-in for documentation, resolver, catalog and extractor.
#[derive(Default)]
struct World {
    pages: Vec<DocumentedPage>,
    targets: BTreeMap<(String, String), PhysicalTarget>,
    definitions: BTreeMap<String, DefinitionSnapshot>,
    failing_sources: BTreeSet<String>,
    resolver_down: bool,
}

impl World {
    fn security_master(columns: &[&str]) -> Self {
        let mut world = World::default();
        world.document(columns);
        for env in ["DEV", "PROD"] {
            world.targets.insert(
                ("SECURITY_MASTER".to_string(), env.to_string()),
                PhysicalTarget::new(FQDN, ObjectKind::View),
            );
        }
        world.define("h1", "CUSIP VARCHAR(9), ISSUER_NAME VARCHAR(200)");
        world
    }

    fn document(&mut self, targets: &[&str]) {
        let columns = targets
            .iter()
            .map(|t| DocumentedColumn::new("security_master", *t))
            .collect();
        self.pages = vec![DocumentedPage::new(PAGE, columns)];
    }

    fn define(&mut self, hash: &str, ddl: &str) {
        self.definitions
            .insert(FQDN.to_string(), DefinitionSnapshot::new(hash, ddl));
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            documentation: self,
            resolver: self,
            definitions: self,
            extractor: self,
            types: None,
        }
    }
}

impl DocumentationSource for World {
    fn page_ids(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.pages.iter().map(|p| p.page_id.clone()).collect())
    }

    fn documented_page(&self, page_id: &str) -> Result<DocumentedPage, CollaboratorError> {
        self.pages
            .iter()
            .find(|p| p.page_id == page_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::failed("documentation", "page not found"))
    }
}

impl TargetResolver for World {
    fn resolve(
        &self,
        logical_source: &str,
        environment: &str,
    ) -> Result<Option<PhysicalTarget>, CollaboratorError> {
        if self.resolver_down {
            return Err(CollaboratorError::unavailable("resolver", "connection refused"));
        }
        let source = logical_source.to_uppercase();
        if self.failing_sources.contains(&source) {
            return Err(CollaboratorError::failed("resolver", "malformed entry"));
        }
        Ok(self
            .targets
            .get(&(source, environment.to_string()))
            .cloned())
    }
}

impl DefinitionSource for World {
    fn definition(
        &self,
        target: &PhysicalTarget,
        _environment: &str,
    ) -> Result<Option<DefinitionSnapshot>, CollaboratorError> {
        Ok(self.definitions.get(&target.fqdn).cloned())
    }
}

impl ColumnExtractor for World {
    fn extract_columns(&self, definition: &str) -> Result<Vec<PhysicalColumn>, CollaboratorError> {
        Ok(definition
            .split(',')
            .filter_map(|item| {
                let mut parts = item.split_whitespace();
                let name = parts.next()?;
                Some(PhysicalColumn::new(name, parts.collect::<Vec<_>>().join(" ")))
            })
            .collect())
    }
}

struct UppercaseTypes;

impl TypeResolver for UppercaseTypes {
    fn resolve_type(&self, documented_type: &str) -> (String, Vec<String>) {
        (documented_type.trim().to_uppercase(), Vec::new())
    }
}

/// Store that fails every write for the listed target names, and every
/// flush when `fail_flush` is set.
#[derive(Default)]
struct FlakyStore {
    inner: InMemoryMappingStore,
    fail_targets: BTreeSet<String>,
    fail_flush: bool,
    flushes: usize,
}

impl MappingStore for FlakyStore {
    fn get(&self, key: &MappingKey) -> Result<Option<MappingRecord>, StoreError> {
        self.inner.get(key)
    }

    fn upsert(&mut self, record: MappingRecord) -> Result<(), StoreError> {
        if self.fail_targets.contains(&record.key.target_field_name) {
            return Err(StoreError::Io {
                operation: "write",
                path: PathBuf::from("mappings.json"),
                source: std::io::Error::other("disk full"),
            });
        }
        self.inner.upsert(record)
    }

    fn list_active(&self, scope: &MappingScope) -> Result<Vec<MappingRecord>, StoreError> {
        self.inner.list_active(scope)
    }

    fn scopes(&self, page_id: &str, environment: &str) -> Result<Vec<MappingScope>, StoreError> {
        self.inner.scopes(page_id, environment)
    }

    fn records(&self) -> Result<Vec<MappingRecord>, StoreError> {
        self.inner.records()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.flushes += 1;
        if self.fail_flush {
            return Err(StoreError::Io {
                operation: "replace",
                path: PathBuf::from("mappings.json"),
                source: std::io::Error::other("read-only file system"),
            });
        }
        Ok(())
    }
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, 9, 0, 0).unwrap()
}

fn config(threshold: i64, strategy: MatchStrategy, exact_only: bool) -> EngineConfig {
    EngineConfig::new(MatcherConfig::new(threshold, strategy, exact_only), ["DEV"]).unwrap()
}

fn default_config() -> EngineConfig {
    config(80, MatchStrategy::TokenSetRatio, false)
}

fn run(
    world: &World,
    config: &EngineConfig,
    store: &mut dyn MappingStore,
    clock: &dyn Clock,
) -> RunReport {
    ReconciliationEngine::new(config.clone(), world.collaborators())
        .run(store, clock)
        .expect("run should complete")
}

fn key(target: &str) -> MappingKey {
    MappingKey::new(PAGE, target, FQDN, "DEV", ObjectKind::View)
}

fn record(store: &dyn MappingStore, target: &str) -> MappingRecord {
    store
        .get(&key(target))
        .unwrap()
        .unwrap_or_else(|| panic!("no record for {target}"))
}

#[test]
fn maps_exact_and_fuzzy_columns() {
    let world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    let cusip = record(&store, "CUSIP");
    assert_eq!(cusip.status, MappingStatus::MappedExact);
    assert_eq!(cusip.matched_column.as_deref(), Some("CUSIP"));
    assert_eq!(cusip.match_score, Some(100.0));
    assert_eq!(cusip.match_strategy, Some(MatchStrategy::TokenSetRatio));
    assert_eq!(cusip.ddl_hash_at_mapping, "h1");
    assert!(cusip.is_active);
    assert!(!cusip.user_override);

    let issuer = record(&store, "ISSUER_NM");
    assert_eq!(issuer.status, MappingStatus::MappedFuzzy);
    assert_eq!(issuer.matched_column.as_deref(), Some("ISSUER_NAME"));
    assert!(issuer.match_score.unwrap() >= 80.0);
    assert!(issuer.notes.contains("ISSUER_NAME"));

    let counts = report.counts();
    assert_eq!(counts.mapped_exact, 1);
    assert_eq!(counts.mapped_fuzzy, 1);
    assert!(!report.has_failures());
}

#[test]
fn second_run_without_changes_is_byte_identical() {
    let world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    let clock = FixedClock(at(1));

    run(&world, &default_config(), &mut store, &clock);
    let first = serde_json::to_string(&store.records().unwrap()).unwrap();

    let report = run(&world, &default_config(), &mut store, &clock);
    let second = serde_json::to_string(&store.records().unwrap()).unwrap();

    assert_eq!(first, second);
    assert!(
        report
            .units
            .iter()
            .all(|u| u.action == UnitAction::Unchanged)
    );
}

#[test]
fn unchanged_definition_only_refreshes_timestamp() {
    let world = World::security_master(&["ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));
    let before = record(&store, "ISSUER_NM");

    run(&world, &default_config(), &mut store, &FixedClock(at(2)));
    let after = record(&store, "ISSUER_NM");

    assert_eq!(after.last_mapped_on, at(2));
    assert_eq!(
        MappingRecord {
            last_mapped_on: before.last_mapped_on,
            ..after
        },
        before
    );
}

#[test]
fn changed_definition_is_rematched() {
    let mut world = World::security_master(&["ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    world.define("h2", "CUSIP VARCHAR(9), ISSUER_NM VARCHAR(200)");
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(2)));

    let issuer = record(&store, "ISSUER_NM");
    assert_eq!(issuer.status, MappingStatus::MappedExact);
    assert_eq!(issuer.ddl_hash_at_mapping, "h2");
    assert_eq!(
        report.units[0].action,
        UnitAction::Matched {
            status: MappingStatus::MappedExact
        }
    );
}

#[test]
fn low_score_result_is_rematched_even_with_same_hash() {
    let world = World::security_master(&["MATURITY_DT"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));
    assert_eq!(
        record(&store, "MATURITY_DT").status,
        MappingStatus::UnmappedLowScore
    );

    let report = run(&world, &default_config(), &mut store, &FixedClock(at(2)));
    assert!(matches!(report.units[0].action, UnitAction::Matched { .. }));
    assert_eq!(record(&store, "MATURITY_DT").match_score, None);
}

#[test]
fn overrides_survive_rematching_and_column_removal() {
    let mut world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    set_override(
        &mut store,
        key("ISSUER_NM"),
        "issuer_name",
        Some("confirmed by data steward"),
        at(2),
    )
    .unwrap();

    world.define("h2", "CUSIP VARCHAR(9), ISSUER_NM VARCHAR(200)");
    run(&world, &default_config(), &mut store, &FixedClock(at(3)));
    world.define("h3", "CUSIP VARCHAR(9)");
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(4)));

    let issuer = record(&store, "ISSUER_NM");
    assert_eq!(issuer.matched_column.as_deref(), Some("ISSUER_NAME"));
    assert_eq!(issuer.match_score, None);
    assert_eq!(issuer.match_strategy, None);
    assert_eq!(issuer.status, MappingStatus::MappedUserOverride);
    assert_eq!(issuer.ddl_hash_at_mapping, "h3");
    assert_eq!(issuer.notes, "confirmed by data steward");
    assert_eq!(issuer.last_mapped_on, at(4));
    assert_eq!(report.counts().override_kept, 1);
}

#[test]
fn exact_name_beats_fuzzy_for_every_strategy() {
    let mut world = World::security_master(&["cusip"]);
    world.define("h1", "CUSIP_ID VARCHAR(12), CUSIP VARCHAR(9)");

    for strategy in MatchStrategy::ALL {
        let mut store = InMemoryMappingStore::new();
        run(&world, &config(80, strategy, false), &mut store, &FixedClock(at(1)));
        let cusip = record(&store, "cusip");
        assert_eq!(cusip.status, MappingStatus::MappedExact, "{strategy}");
        assert_eq!(cusip.match_score, Some(100.0), "{strategy}");
        assert_eq!(cusip.matched_column.as_deref(), Some("CUSIP"), "{strategy}");
    }
}

#[test]
fn candidate_at_threshold_is_accepted() {
    let mut world = World::security_master(&["ABCD"]);
    world.define("h1", "ABCE NUMBER");

    let mut store = InMemoryMappingStore::new();
    run(&world, &config(75, MatchStrategy::Ratio, false), &mut store, &FixedClock(at(1)));
    let accepted = record(&store, "ABCD");
    assert_eq!(accepted.status, MappingStatus::MappedFuzzy);
    assert_eq!(accepted.match_score, Some(75.0));

    let mut store = InMemoryMappingStore::new();
    run(&world, &config(76, MatchStrategy::Ratio, false), &mut store, &FixedClock(at(1)));
    let rejected = record(&store, "ABCD");
    assert_eq!(rejected.status, MappingStatus::UnmappedLowScore);
    assert_eq!(rejected.matched_column, None);
}

#[test]
fn exact_only_rejects_high_fuzzy_scores() {
    let world = World::security_master(&["ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(
        &world,
        &config(50, MatchStrategy::TokenSetRatio, true),
        &mut store,
        &FixedClock(at(1)),
    );

    let issuer = record(&store, "ISSUER_NM");
    assert_eq!(issuer.status, MappingStatus::UnmappedNotExact);
    assert!(issuer.match_score.unwrap() >= 80.0);
    assert!(issuer.notes.contains("only exact matches"));
}

#[test]
fn orphan_round_trip() {
    let mut world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    world.document(&["CUSIP"]);
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(2)));
    let orphan = record(&store, "ISSUER_NM");
    assert!(!orphan.is_active);
    assert_eq!(orphan.status, MappingStatus::InactiveOrphaned);
    assert!(!orphan.user_override);
    assert!(orphan.notes.contains("removed from documentation"));
    assert_eq!(report.counts().deactivated, 1);

    world.document(&["CUSIP", "ISSUER_NM"]);
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(3)));
    let revived = record(&store, "ISSUER_NM");
    assert!(revived.is_active);
    assert_eq!(revived.status, MappingStatus::MappedFuzzy);
    assert_eq!(revived.last_mapped_on, at(3));
    assert_eq!(report.counts().mapped_fuzzy, 1);
}

#[test]
fn override_masks_orphan() {
    let mut world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));
    set_override(&mut store, key("ISSUER_NM"), "ISSUER_NAME", None, at(1)).unwrap();

    world.document(&["CUSIP"]);
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(2)));

    let issuer = record(&store, "ISSUER_NM");
    assert!(issuer.is_active);
    assert!(issuer.user_override);
    assert_eq!(issuer.matched_column.as_deref(), Some("ISSUER_NAME"));
    assert_eq!(issuer.last_mapped_on, at(2));
    assert_eq!(report.counts().override_masked_orphan, 1);
    assert_eq!(report.counts().deactivated, 0);
}

#[test]
fn excluded_but_documented_column_is_not_orphaned() {
    let mut world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    world.pages[0].columns[1].include_in_mapping = false;
    run(&world, &default_config(), &mut store, &FixedClock(at(2)));

    let issuer = record(&store, "ISSUER_NM");
    assert!(issuer.is_active);
    assert_eq!(issuer.status, MappingStatus::MappedFuzzy);
    assert_eq!(issuer.last_mapped_on, at(1));
}

#[test]
fn orphans_are_swept_when_source_no_longer_resolves() {
    let mut world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = InMemoryMappingStore::new();
    run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    world.pages = vec![DocumentedPage::new(
        PAGE,
        vec![DocumentedColumn::new("issuer_master", "CUSIP")],
    )];
    run(&world, &default_config(), &mut store, &FixedClock(at(2)));

    assert!(record(&store, "CUSIP").is_active);
    assert_eq!(
        record(&store, "ISSUER_NM").status,
        MappingStatus::InactiveOrphaned
    );
}

#[test]
fn unresolved_environment_is_skipped() {
    let world = World::security_master(&["CUSIP"]);
    let config = EngineConfig::new(MatcherConfig::default(), ["dev", "qa", "DEV"]).unwrap();
    assert_eq!(config.environments, vec!["DEV", "QA"]);

    let mut store = InMemoryMappingStore::new();
    let report = run(&world, &config, &mut store, &FixedClock(at(1)));

    assert_eq!(store.len(), 1);
    let skipped: Vec<_> = report.skipped().collect();
    assert_eq!(skipped.len(), 1);
    assert_eq!(skipped[0].environment, "QA");
    assert_eq!(
        skipped[0].action,
        UnitAction::Skipped(SkipReason::Unresolved {
            source_table: "SECURITY_MASTER".to_string()
        })
    );
    assert!(!report.has_failures());
}

#[test]
fn missing_definition_is_skipped() {
    let mut world = World::security_master(&["CUSIP"]);
    world.definitions.clear();
    let mut store = InMemoryMappingStore::new();
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    assert!(store.is_empty());
    assert_eq!(
        report.units[0].action,
        UnitAction::Skipped(SkipReason::NoDefinition {
            fqdn: FQDN.to_string()
        })
    );
}

#[test]
fn store_failure_does_not_stop_other_units() {
    let world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = FlakyStore {
        fail_targets: BTreeSet::from(["CUSIP".to_string()]),
        ..FlakyStore::default()
    };
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    assert!(report.has_failures());
    let failure = report.failures().next().unwrap();
    assert_eq!(failure.target_field_name.as_deref(), Some("CUSIP"));
    assert!(failure.notes.contains("mappings.json"));
    assert_eq!(
        store.get(&key("ISSUER_NM")).unwrap().unwrap().status,
        MappingStatus::MappedFuzzy
    );
}

#[test]
fn store_is_flushed_once_per_pass() {
    let mut world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    world
        .pages
        .push(DocumentedPage::new("4343", vec![DocumentedColumn::new("security_master", "CUSIP")]));
    let config =
        EngineConfig::new(MatcherConfig::new(80, MatchStrategy::TokenSetRatio, false), ["DEV", "PROD"])
            .unwrap();
    let mut store = FlakyStore::default();
    run(&world, &config, &mut store, &FixedClock(at(1)));

    assert_eq!(store.flushes, 4);
}

#[test]
fn failed_flush_fails_the_units_of_its_pass() {
    let world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let mut store = FlakyStore {
        fail_flush: true,
        ..FlakyStore::default()
    };
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    assert_eq!(report.counts().failed, 2);
    for unit in report.failures() {
        assert!(unit.notes.contains("read-only file system"), "{}", unit.notes);
    }
}

#[test]
fn gated_rerun_leaves_store_file_untouched() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("mappings.json");
    let world = World::security_master(&["CUSIP", "ISSUER_NM"]);
    let clock = FixedClock(at(1));

    let mut store = JsonMappingRepository::open(&path).expect("open store");
    run(&world, &default_config(), &mut store, &clock);
    let first = std::fs::read_to_string(&path).expect("read store");

    let mut store = JsonMappingRepository::open(&path).expect("reopen store");
    let report = run(&world, &default_config(), &mut store, &clock);
    assert_eq!(report.counts().unchanged, 2);
    assert!(!store.has_pending_writes());
    // `saved_at` would differ had the file been rewritten.
    assert_eq!(std::fs::read_to_string(&path).expect("read store"), first);
}

#[test]
fn failed_resolution_only_affects_its_source() {
    let mut world = World::security_master(&["CUSIP"]);
    world.pages[0]
        .columns
        .push(DocumentedColumn::new("broken_source", "PRICE"));
    world.failing_sources.insert("BROKEN_SOURCE".to_string());

    let mut store = InMemoryMappingStore::new();
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    assert_eq!(report.counts().failed, 1);
    assert_eq!(record(&store, "CUSIP").status, MappingStatus::MappedExact);
}

#[test]
fn unavailable_resolver_aborts_run() {
    let mut world = World::security_master(&["CUSIP"]);
    world.resolver_down = true;
    let mut store = InMemoryMappingStore::new();

    let result = ReconciliationEngine::new(default_config(), world.collaborators())
        .run(&mut store, &FixedClock(at(1)));

    assert!(matches!(result, Err(ReconError::CollaboratorUnavailable(_))));
    assert!(store.is_empty());
}

#[test]
fn duplicate_targets_are_processed_once() {
    let mut world = World::security_master(&["CUSIP", "CUSIP"]);
    world.pages[0].columns[1].source_table = "other_source".to_string();
    let mut store = InMemoryMappingStore::new();
    let report = run(&world, &default_config(), &mut store, &FixedClock(at(1)));

    assert_eq!(store.len(), 1);
    assert_eq!(
        report.units[1].action,
        UnitAction::Skipped(SkipReason::DuplicateTarget)
    );
}

#[test]
fn empty_environment_list_is_rejected() {
    let empty: [&str; 0] = [];
    assert!(EngineConfig::new(MatcherConfig::default(), empty).is_err());
    assert!(EngineConfig::new(MatcherConfig::default(), ["  "]).is_err());
}

#[test]
fn exact_match_note_describes_documented_column() {
    let mut world = World::security_master(&["CUSIP"]);
    world.pages[0].columns[0] = DocumentedColumn::new("security_master", "CUSIP")
        .with_source_field("CUSIP_ID")
        .with_type("varchar(9)")
        .with_definition("Nine character security identifier");
    let types = UppercaseTypes;
    let collaborators = Collaborators {
        types: Some(&types),
        ..world.collaborators()
    };

    let mut store = InMemoryMappingStore::new();
    ReconciliationEngine::new(default_config(), collaborators)
        .run(&mut store, &FixedClock(at(1)))
        .unwrap();

    insta::assert_snapshot!(
        record(&store, "CUSIP").notes,
        @"Auto-mapped: Exact match for 'CUSIP' to 'CUSIP' (100%). Documented source: security_master.CUSIP_ID, documented type: varchar(9) (resolves to VARCHAR(9)), physical type: VARCHAR(9), definition: Nine character security identifier."
    );
}
