use std::path::Path;

use anyhow::{Context, Result, bail};
use recon_cli::config::AppConfig;
use recon_ingest::{
    DataTypeMap, DdlColumnExtractor, FqdnResolver, PageCatalog, ParityReport, SnapshotCatalog,
    SourceValidation, TypeResolution, compare_environments,
};
use recon_map::{
    Clock, Collaborators, JsonMappingRepository, MappingStore, ReconciliationEngine, RunReport,
    SystemClock, TypeResolver, clear_override, set_override,
};
use recon_model::{MappingKey, MappingRecord};
use tracing::{info, info_span, warn};

use crate::cli::{KeyArgs, MappingsArgs, ParityArgs, SetOverrideArgs};

/// One documented type with its resolution and the pages using it.
pub struct TypeReportRow {
    pub resolution: TypeResolution,
    pub pages: Vec<String>,
}

pub fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::load(path).with_context(|| format!("load configuration {}", path.display()))
}

fn load_pages(config: &AppConfig) -> Result<PageCatalog> {
    PageCatalog::load(&config.paths.documentation, &config.documentation)
        .context("load documentation pages")
}

fn load_resolver(config: &AppConfig) -> Result<FqdnResolver> {
    FqdnResolver::load(&config.paths.resolver).context("load source resolver")
}

/// The type map is optional; without it notes carry no resolved type.
fn load_types(config: &AppConfig) -> Result<Option<DataTypeMap>> {
    let path = &config.paths.data_types;
    if !path.exists() {
        info!(path = %path.display(), "no data type map, skipping type resolution");
        return Ok(None);
    }
    DataTypeMap::load(path)
        .map(Some)
        .context("load data type map")
}

fn load_definitions(config: &AppConfig) -> Result<SnapshotCatalog> {
    SnapshotCatalog::load(&config.paths.definitions).context("load definition snapshots")
}

fn open_store(config: &AppConfig) -> Result<JsonMappingRepository> {
    JsonMappingRepository::open(&config.paths.mappings).context("open mapping store")
}

pub fn run_reconcile(config: &AppConfig) -> Result<RunReport> {
    let span = info_span!("run", config = %config.source.display());
    let _guard = span.enter();

    let pages = load_pages(config)?;
    let resolver = load_resolver(config)?;
    let definitions = load_definitions(config)?;
    let types = load_types(config)?;
    let extractor = DdlColumnExtractor;
    if pages.is_empty() {
        warn!("no documented pages to reconcile");
    }

    let engine = ReconciliationEngine::new(
        config.engine.clone(),
        Collaborators {
            documentation: &pages,
            resolver: &resolver,
            definitions: &definitions,
            extractor: &extractor,
            types: types.as_ref().map(|t| t as &dyn TypeResolver),
        },
    );
    let mut store = open_store(config)?;
    engine
        .run(&mut store, &SystemClock)
        .context("reconciliation run")
}

pub fn list_mappings(config: &AppConfig, args: &MappingsArgs) -> Result<Vec<MappingRecord>> {
    let store = open_store(config)?;
    let environment = args
        .environment
        .as_deref()
        .map(|env| env.trim().to_uppercase());
    let records = store
        .records()
        .context("read mapping records")?
        .into_iter()
        .filter(|record| args.include_inactive || record.is_active)
        .filter(|record| args.page.as_deref().is_none_or(|page| record.key.page_id == page))
        .filter(|record| {
            environment
                .as_deref()
                .is_none_or(|env| record.key.environment == env)
        })
        .filter(|record| args.status.is_none_or(|status| record.status == status))
        .collect();
    Ok(records)
}

fn mapping_key(args: &KeyArgs) -> MappingKey {
    MappingKey::new(
        args.page.trim(),
        args.target.trim(),
        args.fqdn.trim(),
        args.environment.trim().to_uppercase(),
        args.kind,
    )
}

pub fn run_override_set(config: &AppConfig, args: &SetOverrideArgs) -> Result<MappingRecord> {
    let key = mapping_key(&args.key);
    let mut store = open_store(config)?;
    let record = set_override(
        &mut store,
        key.clone(),
        &args.column,
        args.note.as_deref(),
        SystemClock.now(),
    )
    .with_context(|| format!("set override for {key}"))?;
    info!(key = %key, column = ?record.matched_column, "manual override set");
    Ok(record)
}

pub fn run_override_clear(config: &AppConfig, args: &KeyArgs) -> Result<MappingRecord> {
    let key = mapping_key(args);
    let mut store = open_store(config)?;
    let record = clear_override(&mut store, &key, SystemClock.now())
        .with_context(|| format!("clear override for {key}"))?;
    info!(key = %key, "manual override cleared");
    Ok(record)
}

pub fn run_types(config: &AppConfig) -> Result<Vec<TypeReportRow>> {
    let pages = load_pages(config)?;
    let types = load_types(config)?.unwrap_or_default();
    let rows: Vec<TypeReportRow> = pages
        .documented_types()
        .into_iter()
        .map(|(documented, pages)| TypeReportRow {
            resolution: types.resolve(&documented),
            pages: pages.into_iter().collect(),
        })
        .collect();
    for row in rows.iter().filter(|row| !row.resolution.warnings.is_empty()) {
        warn!(
            documented = %row.resolution.documented,
            resolved = %row.resolution.resolved,
            "documented type fell back"
        );
    }
    Ok(rows)
}

pub fn run_sources(config: &AppConfig) -> Result<SourceValidation> {
    let pages = load_pages(config)?;
    let resolver = load_resolver(config)?;
    let report = resolver.validate_sources(pages.source_tables());
    for source in &report.unmapped {
        warn!(source = %source, "documented source has no resolver entry");
    }
    Ok(report)
}

fn configured_environment(config: &AppConfig, env: &str) -> Result<String> {
    let env = env.trim().to_uppercase();
    if !config.engine.environments.contains(&env) {
        bail!(
            "environment '{env}' is not configured (expected one of: {})",
            config.engine.environments.join(", ")
        );
    }
    Ok(env)
}

pub fn run_parity(config: &AppConfig, args: &ParityArgs) -> Result<ParityReport> {
    let source_env = configured_environment(config, &args.source_env)?;
    let target_env = configured_environment(config, &args.target_env)?;
    let definitions = load_definitions(config)?;
    let report = compare_environments(&definitions, &source_env, &target_env);
    if let Some(path) = &args.output {
        std::fs::write(path, report.to_markdown())
            .with_context(|| format!("write parity report {}", path.display()))?;
        info!(path = %path.display(), "parity report written");
    }
    Ok(report)
}
