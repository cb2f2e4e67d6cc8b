//! Orphan lifecycle: deactivating records whose column left the documentation.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use recon_model::{MappingRecord, MappingScope, MappingStatus};

use crate::report::{UnitAction, UnitOutcome};
use crate::store::MappingStore;

/// What the sweep does with one active record.
#[derive(Debug, Clone, PartialEq)]
pub enum OrphanDecision {
    /// Still documented; left untouched.
    Keep,
    /// No longer documented; write the deactivated record.
    Deactivate(MappingRecord),
    /// No longer documented but manually overridden; write the audit refresh only.
    OverrideMasked(MappingRecord),
}

/// Decide the fate of an active record given the page's documented targets.
pub fn orphan_decision(
    record: &MappingRecord,
    documented: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> OrphanDecision {
    if documented.contains(&record.key.target_field_name) {
        return OrphanDecision::Keep;
    }
    let mut updated = record.clone();
    updated.last_mapped_on = now;
    if record.user_override {
        return OrphanDecision::OverrideMasked(updated);
    }
    updated.is_active = false;
    updated.status = MappingStatus::InactiveOrphaned;
    updated.notes = format!(
        "Automatically marked inactive: column '{}' was removed from documentation page {}.",
        record.key.target_field_name, record.key.page_id
    );
    OrphanDecision::Deactivate(updated)
}

/// Sweep one scope and commit each decision separately.
///
/// A store failure affects only the record (or scope listing) it occurred on.
pub fn sweep_orphans(
    store: &mut dyn MappingStore,
    scope: &MappingScope,
    documented: &BTreeSet<String>,
    now: DateTime<Utc>,
) -> Vec<UnitOutcome> {
    let active = match store.list_active(scope) {
        Ok(active) => active,
        Err(error) => {
            tracing::error!(%scope, error = %error, "failed to list active mappings");
            return vec![
                UnitOutcome::new(
                    &scope.page_id,
                    &scope.environment,
                    None,
                    UnitAction::Failed {
                        message: error.to_string(),
                    },
                )
                .in_scope(scope)
                .with_notes("orphan sweep skipped for this scope"),
            ];
        }
    };

    let mut outcomes = Vec::new();
    for record in active {
        let target = record.key.target_field_name.clone();
        let (updated, action, notes) = match orphan_decision(&record, documented, now) {
            OrphanDecision::Keep => continue,
            OrphanDecision::Deactivate(updated) => {
                let notes = updated.notes.clone();
                (updated, UnitAction::Deactivated, notes)
            }
            OrphanDecision::OverrideMasked(updated) => {
                let notes = format!(
                    "'{target}' is no longer documented but has a manual override; kept active"
                );
                (updated, UnitAction::OverrideMaskedOrphan, notes)
            }
        };

        let outcome = UnitOutcome::new(
            &scope.page_id,
            &scope.environment,
            Some(target.clone()),
            action.clone(),
        )
        .in_scope(scope);

        match store.upsert(updated) {
            Ok(()) => {
                match action {
                    UnitAction::Deactivated => {
                        tracing::warn!(%scope, column = %target, "deactivated orphaned mapping");
                    }
                    _ => tracing::info!(
                        %scope,
                        column = %target,
                        "orphaned mapping kept active by manual override"
                    ),
                }
                outcomes.push(outcome.with_notes(notes));
            }
            Err(error) => {
                tracing::error!(%scope, column = %target, error = %error, "failed to persist orphan decision");
                outcomes.push(UnitOutcome {
                    action: UnitAction::Failed {
                        message: error.to_string(),
                    },
                    ..outcome
                });
            }
        }
    }
    outcomes
}
