//! Per-unit outcomes of a reconciliation run.

use std::fmt;

use recon_model::{MappingScope, MappingStatus};
use serde::Serialize;

/// Why a unit was skipped without touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    NoTargetName,
    NoSourceTable,
    Unresolved { source_table: String },
    NoDefinition { fqdn: String },
    NoColumns { fqdn: String },
    DuplicateTarget,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoTargetName => write!(f, "no target field name documented"),
            SkipReason::NoSourceTable => write!(f, "no source table documented"),
            SkipReason::Unresolved { source_table } => {
                write!(f, "source '{source_table}' has no object in this environment")
            }
            SkipReason::NoDefinition { fqdn } => write!(f, "no physical definition for {fqdn}"),
            SkipReason::NoColumns { fqdn } => {
                write!(f, "no columns extracted from definition of {fqdn}")
            }
            SkipReason::DuplicateTarget => {
                write!(f, "target documented more than once on the page")
            }
        }
    }
}

/// What happened to one unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum UnitAction {
    /// The matcher ran and the record was written with this status.
    Matched { status: MappingStatus },
    /// Definition unchanged since the last automatic match; only audited.
    Unchanged,
    /// A manual override was left in place.
    OverrideKept,
    /// Orphaned record deactivated.
    Deactivated,
    /// Orphaned record kept active because of a manual override.
    OverrideMaskedOrphan,
    Skipped(SkipReason),
    Failed { message: String },
}

/// Outcome of one (page, environment, column) unit or orphan decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitOutcome {
    pub page_id: String,
    pub environment: String,
    /// `None` for page- or scope-level outcomes.
    pub target_field_name: Option<String>,
    pub scope: Option<MappingScope>,
    pub action: UnitAction,
    pub notes: String,
}

impl UnitAction {
    /// Whether the action upserted a record.
    pub fn writes_record(&self) -> bool {
        matches!(
            self,
            UnitAction::Matched { .. }
                | UnitAction::Unchanged
                | UnitAction::OverrideKept
                | UnitAction::Deactivated
                | UnitAction::OverrideMaskedOrphan
        )
    }
}

impl UnitOutcome {
    pub fn new(
        page_id: impl Into<String>,
        environment: impl Into<String>,
        target_field_name: Option<String>,
        action: UnitAction,
    ) -> Self {
        Self {
            page_id: page_id.into(),
            environment: environment.into(),
            target_field_name,
            scope: None,
            action,
            notes: String::new(),
        }
    }

    #[must_use]
    pub fn in_scope(mut self, scope: &MappingScope) -> Self {
        self.scope = Some(scope.clone());
        self
    }

    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn is_failure(&self) -> bool {
        matches!(self.action, UnitAction::Failed { .. })
    }

    pub fn is_skip(&self) -> bool {
        matches!(self.action, UnitAction::Skipped(_))
    }
}

/// Count of outcomes by action.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ActionCounts {
    pub mapped_exact: usize,
    pub mapped_fuzzy: usize,
    pub unmapped_low_score: usize,
    pub unmapped_not_exact: usize,
    pub unchanged: usize,
    pub override_kept: usize,
    pub deactivated: usize,
    pub override_masked_orphan: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Everything a run did, in processing order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub pages_processed: usize,
    pub environments: Vec<String>,
    pub units: Vec<UnitOutcome>,
}

impl RunReport {
    pub fn push(&mut self, outcome: UnitOutcome) {
        self.units.push(outcome);
    }

    pub fn has_failures(&self) -> bool {
        self.units.iter().any(UnitOutcome::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.units.iter().filter(|u| u.is_failure())
    }

    pub fn skipped(&self) -> impl Iterator<Item = &UnitOutcome> {
        self.units.iter().filter(|u| u.is_skip())
    }

    pub fn counts(&self) -> ActionCounts {
        let mut counts = ActionCounts::default();
        for unit in &self.units {
            match &unit.action {
                UnitAction::Matched { status } => match status {
                    MappingStatus::MappedExact => counts.mapped_exact += 1,
                    MappingStatus::MappedFuzzy => counts.mapped_fuzzy += 1,
                    MappingStatus::UnmappedNotExact => counts.unmapped_not_exact += 1,
                    _ => counts.unmapped_low_score += 1,
                },
                UnitAction::Unchanged => counts.unchanged += 1,
                UnitAction::OverrideKept => counts.override_kept += 1,
                UnitAction::Deactivated => counts.deactivated += 1,
                UnitAction::OverrideMaskedOrphan => counts.override_masked_orphan += 1,
                UnitAction::Skipped(_) => counts.skipped += 1,
                UnitAction::Failed { .. } => counts.failed += 1,
            }
        }
        counts
    }
}
