//! Mapping store abstraction.
//!
//! Records are addressed by their five-part [`MappingKey`]; `upsert` replaces
//! whatever is stored under the same key, so at most one record exists per key.
//! Reads and writes are separate operations: the engine decides with `get`
//! and commits with a single `upsert`. Stores may buffer upserts until
//! [`MappingStore::flush`], which the engine calls once per (page,
//! environment) pass.

use std::collections::{BTreeMap, BTreeSet};

use recon_model::{MappingKey, MappingRecord, MappingScope};

use crate::error::StoreError;

pub trait MappingStore {
    fn get(&self, key: &MappingKey) -> Result<Option<MappingRecord>, StoreError>;

    /// Insert or replace the record under `record.key`.
    fn upsert(&mut self, record: MappingRecord) -> Result<(), StoreError>;

    /// Active records of one (page, object, environment) scope, in key order.
    fn list_active(&self, scope: &MappingScope) -> Result<Vec<MappingRecord>, StoreError>;

    /// Every scope holding at least one record for the page and environment.
    fn scopes(&self, page_id: &str, environment: &str) -> Result<Vec<MappingScope>, StoreError>;

    /// All records, in key order.
    fn records(&self) -> Result<Vec<MappingRecord>, StoreError>;

    /// Persist buffered upserts. On failure the buffered upserts are discarded.
    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Store backed by an ordered in-memory map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryMappingStore {
    records: BTreeMap<MappingKey, MappingRecord>,
}

impl InMemoryMappingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = MappingRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.key.clone(), r))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert without persisting anywhere else; returns the replaced record.
    pub(crate) fn insert(&mut self, record: MappingRecord) -> Option<MappingRecord> {
        self.records.insert(record.key.clone(), record)
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &MappingRecord> {
        self.records.values()
    }
}

impl MappingStore for InMemoryMappingStore {
    fn get(&self, key: &MappingKey) -> Result<Option<MappingRecord>, StoreError> {
        Ok(self.records.get(key).cloned())
    }

    fn upsert(&mut self, record: MappingRecord) -> Result<(), StoreError> {
        record.key.validate()?;
        self.insert(record);
        Ok(())
    }

    fn list_active(&self, scope: &MappingScope) -> Result<Vec<MappingRecord>, StoreError> {
        Ok(self
            .records
            .values()
            .filter(|r| r.is_active && r.key.scope() == *scope)
            .cloned()
            .collect())
    }

    fn scopes(&self, page_id: &str, environment: &str) -> Result<Vec<MappingScope>, StoreError> {
        let scopes: BTreeSet<MappingScope> = self
            .records
            .keys()
            .filter(|k| k.page_id == page_id && k.environment == environment)
            .map(MappingKey::scope)
            .collect();
        Ok(scopes.into_iter().collect())
    }

    fn records(&self) -> Result<Vec<MappingRecord>, StoreError> {
        Ok(self.records.values().cloned().collect())
    }
}
