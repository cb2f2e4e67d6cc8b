//! Human edits: pinning a mapping by hand and releasing it again.

use chrono::{DateTime, Utc};
use recon_model::{MappingKey, MappingRecord, MappingStatus};

use crate::error::StoreError;
use crate::store::MappingStore;

/// Pin `key` to `column` and flush the store.
///
/// Creates the record if needed. Once set, automatic runs never change the
/// matched column, and the orphan sweep never deactivates the record.
pub fn set_override(
    store: &mut dyn MappingStore,
    key: MappingKey,
    column: &str,
    note: Option<&str>,
    now: DateTime<Utc>,
) -> Result<MappingRecord, StoreError> {
    key.validate()?;
    let column = column.trim().to_uppercase();
    let mut record = store
        .get(&key)?
        .unwrap_or_else(|| MappingRecord::new(key, now));

    record.matched_column = Some(column.clone());
    record.match_score = None;
    record.match_strategy = None;
    record.status = MappingStatus::MappedUserOverride;
    record.user_override = true;
    record.is_active = true;
    record.notes = match note {
        Some(note) if !note.trim().is_empty() => note.trim().to_string(),
        _ => format!("Manual override: mapped to '{column}'."),
    };
    record.last_mapped_on = now;

    store.upsert(record.clone())?;
    store.flush()?;
    tracing::info!(key = %record.key, column = %column, "manual override set");
    Ok(record)
}

/// Release a manual override so the next run re-matches the column from
/// scratch, and flush the store.
pub fn clear_override(
    store: &mut dyn MappingStore,
    key: &MappingKey,
    now: DateTime<Utc>,
) -> Result<MappingRecord, StoreError> {
    let mut record = store
        .get(key)?
        .ok_or_else(|| StoreError::NotFound(key.to_string()))?;

    record.user_override = false;
    record.status = MappingStatus::Unmapped;
    record.ddl_hash_at_mapping.clear();
    record.notes = "Manual override cleared; pending re-evaluation.".to_string();
    record.last_mapped_on = now;

    store.upsert(record.clone())?;
    store.flush()?;
    tracing::info!(key = %record.key, "manual override cleared");
    Ok(record)
}
