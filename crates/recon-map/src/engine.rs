//! Reconciliation engine.
//!
//! Iterates pages × environments × documented columns, decides each unit with
//! [`decide`] (pure, no store access) and commits the result with a single
//! upsert. After every (page, environment) pass the orphan sweep retires
//! records whose column left the page.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use recon_model::{
    DefinitionSnapshot, DocumentedColumn, DocumentedPage, MappingKey, MappingRecord, MappingScope,
    MappingStatus, PhysicalColumn, PhysicalTarget,
};
use tracing::{debug, error, info, info_span, warn};

use crate::clock::Clock;
use crate::collab::Collaborators;
use crate::error::{CollaboratorError, ConfigError, ReconError, Result};
use crate::matcher::{MatchOutcome, MatcherConfig};
use crate::orphan::sweep_orphans;
use crate::report::{RunReport, SkipReason, UnitAction, UnitOutcome};
use crate::store::MappingStore;

/// Validated run configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub matcher: MatcherConfig,
    /// Upper-cased, de-duplicated, in configured order.
    pub environments: Vec<String>,
}

impl EngineConfig {
    pub fn new<I, S>(matcher: MatcherConfig, environments: I) -> std::result::Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut canonical: Vec<String> = Vec::new();
        for env in environments {
            let env = env.as_ref().trim().to_uppercase();
            if !env.is_empty() && !canonical.contains(&env) {
                canonical.push(env);
            }
        }
        if canonical.is_empty() {
            return Err(ConfigError::NoEnvironments);
        }
        Ok(Self {
            matcher,
            environments: canonical,
        })
    }
}

/// Result of deciding one unit, ready to commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub record: MappingRecord,
    pub action: UnitAction,
}

/// Inputs describing the physical side of one unit.
#[derive(Debug, Clone, Copy)]
pub struct PhysicalContext<'a> {
    pub snapshot: &'a DefinitionSnapshot,
    pub columns: &'a [PhysicalColumn],
    /// Warehouse type the documented type resolves to, when known.
    pub resolved_type: Option<&'a str>,
}

/// Decide what to store for one documented column.
///
/// Applies, in order: the override guard, the unchanged-definition gate and
/// fresh matching. Has no side effects.
pub fn decide(
    existing: Option<&MappingRecord>,
    key: MappingKey,
    column: &DocumentedColumn,
    physical: PhysicalContext<'_>,
    matcher: &MatcherConfig,
    now: DateTime<Utc>,
) -> Decision {
    if let Some(existing) = existing {
        if existing.user_override {
            let mut record = existing.clone();
            record.status = MappingStatus::MappedUserOverride;
            record.ddl_hash_at_mapping = physical.snapshot.hash.clone();
            record.is_active = true;
            record.last_mapped_on = now;
            return Decision {
                record,
                action: UnitAction::OverrideKept,
            };
        }

        if existing.ddl_hash_at_mapping == physical.snapshot.hash
            && existing.status.is_automatic_match()
        {
            let mut record = existing.clone();
            record.is_active = true;
            record.last_mapped_on = now;
            return Decision {
                record,
                action: UnitAction::Unchanged,
            };
        }
    }

    let names: Vec<&str> = physical.columns.iter().map(|c| c.name.as_str()).collect();
    let outcome = matcher.evaluate(&column.target_field_name, &names);
    let notes = match_notes(column, &outcome, matcher, physical);

    let mut record = MappingRecord::new(key, now);
    record.matched_column = outcome.matched_column;
    record.match_score = outcome.score;
    record.match_strategy = Some(matcher.match_strategy);
    record.status = outcome.status;
    record.ddl_hash_at_mapping = physical.snapshot.hash.clone();
    record.notes = notes;

    Decision {
        action: UnitAction::Matched {
            status: record.status,
        },
        record,
    }
}

fn format_score(score: f64) -> String {
    if score.fract() == 0.0 {
        format!("{score:.0}%")
    } else {
        format!("{score:.1}%")
    }
}

/// Machine-generated rationale for a freshly matched record.
pub fn match_notes(
    column: &DocumentedColumn,
    outcome: &MatchOutcome,
    matcher: &MatcherConfig,
    physical: PhysicalContext<'_>,
) -> String {
    let target = &column.target_field_name;
    let mut notes = match (&outcome.status, &outcome.matched_column, outcome.score) {
        (MappingStatus::MappedExact, Some(matched), _) => {
            format!("Auto-mapped: Exact match for '{target}' to '{matched}' (100%).")
        }
        (MappingStatus::MappedFuzzy, Some(matched), Some(score)) => format!(
            "Auto-mapped: Fuzzy match ({}) for '{target}' to '{matched}' using {}.",
            format_score(score),
            matcher.match_strategy
        ),
        (MappingStatus::UnmappedNotExact, Some(matched), Some(score)) => format!(
            "Not mapped: best candidate '{matched}' scored {} for '{target}', but only exact matches are accepted.",
            format_score(score)
        ),
        _ => format!(
            "Not mapped: no match found above threshold ({}%) for '{target}' using {}.",
            matcher.match_threshold, matcher.match_strategy
        ),
    };

    let mut details = Vec::new();
    if !column.source_table.trim().is_empty() {
        let source = if column.source_field_name.trim().is_empty() {
            column.source_table.trim().to_string()
        } else {
            format!(
                "{}.{}",
                column.source_table.trim(),
                column.source_field_name.trim()
            )
        };
        details.push(format!("Documented source: {source}"));
    }
    if !column.documented_type.trim().is_empty() {
        let mut detail = format!("documented type: {}", column.documented_type.trim());
        if let Some(resolved) = physical.resolved_type {
            let _ = write!(detail, " (resolves to {resolved})");
        }
        details.push(detail);
    }
    if let Some(matched) = &outcome.matched_column {
        if let Some(physical_column) = physical
            .columns
            .iter()
            .find(|c| &c.name == matched && !c.data_type.trim().is_empty())
        {
            details.push(format!("physical type: {}", physical_column.data_type.trim()));
        }
    }
    if !column.definition.trim().is_empty() {
        details.push(format!("definition: {}", column.definition.trim()));
    }
    if !details.is_empty() {
        let _ = write!(notes, " {}.", details.join(", "));
    }
    notes
}

#[derive(Debug)]
struct PreparedTarget {
    target: PhysicalTarget,
    snapshot: DefinitionSnapshot,
    columns: Vec<PhysicalColumn>,
}

/// Physical-side resolution of one source table, cached per (page, environment).
#[derive(Debug, Clone)]
enum Preparation {
    Ready(Rc<PreparedTarget>),
    Skip(SkipReason),
    Failed(String),
}

/// Reconciles documentation against physical definitions.
pub struct ReconciliationEngine<'a> {
    config: EngineConfig,
    collaborators: Collaborators<'a>,
}

impl<'a> ReconciliationEngine<'a> {
    pub fn new(config: EngineConfig, collaborators: Collaborators<'a>) -> Self {
        Self {
            config,
            collaborators,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Process every page in every configured environment.
    ///
    /// Unit-local failures end up in the report. Only an unavailable
    /// collaborator or an unreadable store aborts the run.
    pub fn run(&self, store: &mut dyn MappingStore, clock: &dyn Clock) -> Result<RunReport> {
        let existing = store.records().map_err(ReconError::Store)?;
        debug!(records = existing.len(), "mapping store opened");

        let page_ids = self
            .collaborators
            .documentation
            .page_ids()
            .map_err(ReconError::CollaboratorUnavailable)?;
        info!(
            pages = page_ids.len(),
            environments = ?self.config.environments,
            strategy = %self.config.matcher.match_strategy,
            threshold = self.config.matcher.match_threshold,
            exact_match_only = self.config.matcher.exact_match_only,
            "starting reconciliation"
        );

        let mut report = RunReport {
            environments: self.config.environments.clone(),
            ..RunReport::default()
        };

        for page_id in page_ids {
            let page = match self.collaborators.documentation.documented_page(&page_id) {
                Ok(page) => page,
                Err(err) if err.is_unavailable() => {
                    return Err(ReconError::CollaboratorUnavailable(err));
                }
                Err(err) => {
                    error!(page_id = %page_id, error = %err, "failed to load documented page");
                    for env in &self.config.environments {
                        report.push(
                            UnitOutcome::new(
                                &page_id,
                                env,
                                None,
                                UnitAction::Failed {
                                    message: err.to_string(),
                                },
                            )
                            .with_notes("page skipped"),
                        );
                    }
                    continue;
                }
            };

            let span = info_span!("page", page_id = %page.page_id);
            let _guard = span.enter();
            for env in &self.config.environments {
                let outcomes = self.reconcile_page(&page, env, store, clock)?;
                report.units.extend(outcomes);
            }
            report.pages_processed += 1;
        }

        let counts = report.counts();
        info!(
            pages = report.pages_processed,
            exact = counts.mapped_exact,
            fuzzy = counts.mapped_fuzzy,
            low_score = counts.unmapped_low_score,
            not_exact = counts.unmapped_not_exact,
            unchanged = counts.unchanged,
            overrides = counts.override_kept,
            deactivated = counts.deactivated,
            skipped = counts.skipped,
            failed = counts.failed,
            "reconciliation finished"
        );
        Ok(report)
    }

    /// One (page, environment) pass followed by its orphan sweep and a store flush.
    ///
    /// When the flush fails, every unit of the pass that wrote a record is
    /// reported as failed.
    pub fn reconcile_page(
        &self,
        page: &DocumentedPage,
        environment: &str,
        store: &mut dyn MappingStore,
        clock: &dyn Clock,
    ) -> Result<Vec<UnitOutcome>> {
        let span = info_span!("environment", environment = %environment);
        let _guard = span.enter();

        let documented = page.documented_target_names();
        let mut outcomes = Vec::new();
        let mut prepared: BTreeMap<String, Preparation> = BTreeMap::new();
        let mut touched: BTreeSet<MappingScope> = BTreeSet::new();
        let mut seen: BTreeSet<&str> = BTreeSet::new();

        for column in page.columns_to_map() {
            let target = column.target_field_name.as_str();
            let unit = |action: UnitAction| {
                UnitOutcome::new(&page.page_id, environment, Some(target.to_string()), action)
            };

            if target.trim().is_empty() {
                outcomes.push(unit(UnitAction::Skipped(SkipReason::NoTargetName)));
                continue;
            }
            if !seen.insert(target) {
                warn!(column = %target, "target documented more than once; later entry ignored");
                outcomes.push(unit(UnitAction::Skipped(SkipReason::DuplicateTarget)));
                continue;
            }
            let source = column.source_table.trim().to_uppercase();
            if source.is_empty() {
                info!(column = %target, "no source table documented");
                outcomes.push(unit(UnitAction::Skipped(SkipReason::NoSourceTable)));
                continue;
            }

            let preparation = match prepared.get(&source) {
                Some(preparation) => preparation.clone(),
                None => {
                    let preparation = match self.prepare(&source, environment) {
                        Ok(preparation) => preparation,
                        Err(err) if err.is_unavailable() => {
                            return Err(ReconError::CollaboratorUnavailable(err));
                        }
                        Err(err) => {
                            error!(source = %source, error = %err, "failed to resolve physical target");
                            Preparation::Failed(err.to_string())
                        }
                    };
                    prepared.insert(source.clone(), preparation.clone());
                    preparation
                }
            };

            let prepared_target = match preparation {
                Preparation::Ready(prepared_target) => prepared_target,
                Preparation::Skip(reason) => {
                    let notes = reason.to_string();
                    outcomes.push(unit(UnitAction::Skipped(reason)).with_notes(notes));
                    continue;
                }
                Preparation::Failed(message) => {
                    outcomes.push(
                        unit(UnitAction::Failed {
                            message: message.clone(),
                        })
                        .with_notes(message),
                    );
                    continue;
                }
            };

            let scope = MappingScope::new(
                &page.page_id,
                &prepared_target.target.fqdn,
                environment,
                prepared_target.target.object_kind,
            );
            touched.insert(scope.clone());
            outcomes.push(
                self.reconcile_column(column, &scope, &prepared_target, store, clock.now())
                    .in_scope(&scope),
            );
        }

        let mut scopes = touched;
        match store.scopes(&page.page_id, environment) {
            Ok(stored) => scopes.extend(stored),
            Err(err) => {
                error!(error = %err, "failed to list stored scopes; sweeping resolved scopes only");
                outcomes.push(
                    UnitOutcome::new(
                        &page.page_id,
                        environment,
                        None,
                        UnitAction::Failed {
                            message: err.to_string(),
                        },
                    )
                    .with_notes("stored scopes not swept"),
                );
            }
        }
        for scope in &scopes {
            outcomes.extend(sweep_orphans(store, scope, &documented, clock.now()));
        }

        if let Err(err) = store.flush() {
            error!(error = %err, "failed to save mapping store; pass discarded");
            let message = err.to_string();
            for outcome in outcomes.iter_mut().filter(|o| o.action.writes_record()) {
                outcome.action = UnitAction::Failed {
                    message: message.clone(),
                };
                outcome.notes.clone_from(&message);
            }
        }

        Ok(outcomes)
    }

    fn reconcile_column(
        &self,
        column: &DocumentedColumn,
        scope: &MappingScope,
        prepared: &PreparedTarget,
        store: &mut dyn MappingStore,
        now: DateTime<Utc>,
    ) -> UnitOutcome {
        let target = column.target_field_name.clone();
        let key = scope.key(target.clone());
        let failed = |message: String| {
            UnitOutcome::new(
                &scope.page_id,
                &scope.environment,
                Some(target.clone()),
                UnitAction::Failed {
                    message: message.clone(),
                },
            )
            .with_notes(message)
        };

        let existing = match store.get(&key) {
            Ok(existing) => existing,
            Err(err) => {
                error!(key = %key, error = %err, "failed to read mapping record");
                return failed(err.to_string());
            }
        };

        let resolved_type = self.resolve_type(column);
        let physical = PhysicalContext {
            snapshot: &prepared.snapshot,
            columns: &prepared.columns,
            resolved_type: resolved_type.as_deref(),
        };
        let decision = decide(
            existing.as_ref(),
            key,
            column,
            physical,
            &self.config.matcher,
            now,
        );

        let notes = decision.record.notes.clone();
        let status = decision.record.status;
        let matched = decision.record.matched_column.clone();
        let score = decision.record.match_score;
        let action = decision.action;
        if let Err(err) = store.upsert(decision.record) {
            error!(column = %target, error = %err, "failed to persist mapping record");
            return failed(err.to_string());
        }

        match (&action, status) {
            (UnitAction::Matched { .. }, MappingStatus::MappedExact | MappingStatus::MappedFuzzy) => {
                info!(column = %target, matched = ?matched, score = ?score, status = %status, "mapped column");
            }
            (UnitAction::Matched { .. }, _) => {
                warn!(column = %target, score = ?score, status = %status, "column not mapped");
            }
            (UnitAction::OverrideKept, _) => {
                debug!(column = %target, "manual override kept");
            }
            _ => debug!(column = %target, "definition unchanged; mapping kept"),
        }

        UnitOutcome::new(&scope.page_id, &scope.environment, Some(target), action).with_notes(notes)
    }

    fn resolve_type(&self, column: &DocumentedColumn) -> Option<String> {
        let resolver = self.collaborators.types?;
        let (resolved, warnings) = resolver.resolve_type(&column.documented_type);
        for warning in warnings {
            warn!(column = %column.target_field_name, "{warning}");
        }
        Some(resolved)
    }

    fn prepare(
        &self,
        source: &str,
        environment: &str,
    ) -> std::result::Result<Preparation, CollaboratorError> {
        let Some(target) = self.collaborators.resolver.resolve(source, environment)? else {
            info!(source = %source, "no physical object for this environment; skipping");
            return Ok(Preparation::Skip(SkipReason::Unresolved {
                source_table: source.to_string(),
            }));
        };

        let snapshot = self
            .collaborators
            .definitions
            .definition(&target, environment)?
            .filter(|snapshot| !snapshot.is_empty());
        let Some(snapshot) = snapshot else {
            warn!(fqdn = %target.fqdn, "no physical definition; skipping");
            return Ok(Preparation::Skip(SkipReason::NoDefinition {
                fqdn: target.fqdn,
            }));
        };

        let columns = self.collaborators.extractor.extract_columns(&snapshot.text)?;
        if columns.is_empty() {
            warn!(fqdn = %target.fqdn, "no columns extracted from definition; skipping");
            return Ok(Preparation::Skip(SkipReason::NoColumns { fqdn: target.fqdn }));
        }

        debug!(fqdn = %target.fqdn, kind = %target.object_kind, columns = columns.len(), "resolved physical target");
        Ok(Preparation::Ready(Rc::new(PreparedTarget {
            target,
            snapshot,
            columns,
        })))
    }
}
