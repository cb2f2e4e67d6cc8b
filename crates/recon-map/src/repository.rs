//! File-backed mapping store.
//!
//! All records live in a single JSON document:
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "saved_at": "2026-01-02T03:04:05Z",
//!   "records": [ { "page_id": "...", "target_field_name": "...", ... } ]
//! }
//! ```
//!
//! Upserts are buffered in memory and written by [`MappingStore::flush`]
//! with an atomic temp-file rename. An upsert that leaves a record unchanged
//! does not dirty the store, so a pass where nothing changed writes nothing.
//! A failed flush never leaves a half-written file behind, and the in-memory
//! view is rolled back to the last saved state.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use recon_model::{MappingKey, MappingRecord, MappingScope};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::store::{InMemoryMappingStore, MappingStore};

const FORMAT_VERSION: &str = "1.0";

#[derive(Debug, Serialize, Deserialize)]
struct StoredMappings {
    #[serde(default = "default_version")]
    version: String,
    saved_at: Option<DateTime<Utc>>,
    records: Vec<MappingRecord>,
}

fn default_version() -> String {
    FORMAT_VERSION.to_string()
}

/// Mapping store persisted as one JSON file.
#[derive(Debug, Clone)]
pub struct JsonMappingRepository {
    path: PathBuf,
    records: InMemoryMappingStore,
    /// Records as last read from or written to disk.
    saved: InMemoryMappingStore,
    dirty: bool,
}

impl JsonMappingRepository {
    /// Open the store at `path`, starting empty when the file does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let records = if path.exists() {
            let contents = fs::read_to_string(&path).map_err(|source| StoreError::Io {
                operation: "read",
                path: path.clone(),
                source,
            })?;
            let stored: StoredMappings =
                serde_json::from_str(&contents).map_err(|source| StoreError::Corrupt {
                    path: path.clone(),
                    source,
                })?;
            tracing::debug!(
                path = %path.display(),
                records = stored.records.len(),
                version = %stored.version,
                "loaded mapping store"
            );
            InMemoryMappingStore::from_records(stored.records)
        } else {
            tracing::info!(path = %path.display(), "creating new mapping store");
            InMemoryMappingStore::new()
        };
        Ok(Self {
            path,
            saved: records.clone(),
            records,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether upserts are waiting for [`MappingStore::flush`].
    pub fn has_pending_writes(&self) -> bool {
        self.dirty
    }

    fn save(&self) -> Result<(), StoreError> {
        let stored = StoredMappings {
            version: default_version(),
            saved_at: Some(Utc::now()),
            records: self.records.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&stored).map_err(StoreError::Serialization)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::Io {
                operation: "create directory for",
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&temp_path).map_err(|source| StoreError::Io {
            operation: "create",
            path: temp_path.clone(),
            source,
        })?;
        file.write_all(json.as_bytes())
            .and_then(|()| file.sync_all())
            .map_err(|source| StoreError::Io {
                operation: "write",
                path: temp_path.clone(),
                source,
            })?;
        fs::rename(&temp_path, &self.path).map_err(|source| StoreError::Io {
            operation: "replace",
            path: self.path.clone(),
            source,
        })?;
        Ok(())
    }
}

impl MappingStore for JsonMappingRepository {
    fn get(&self, key: &MappingKey) -> Result<Option<MappingRecord>, StoreError> {
        self.records.get(key)
    }

    fn upsert(&mut self, record: MappingRecord) -> Result<(), StoreError> {
        record.key.validate()?;
        if self.records.get(&record.key)?.as_ref() == Some(&record) {
            return Ok(());
        }
        self.records.insert(record);
        self.dirty = true;
        Ok(())
    }

    fn list_active(&self, scope: &MappingScope) -> Result<Vec<MappingRecord>, StoreError> {
        self.records.list_active(scope)
    }

    fn scopes(&self, page_id: &str, environment: &str) -> Result<Vec<MappingScope>, StoreError> {
        self.records.scopes(page_id, environment)
    }

    fn records(&self) -> Result<Vec<MappingRecord>, StoreError> {
        self.records.records()
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        if !self.dirty {
            return Ok(());
        }
        self.dirty = false;
        if let Err(error) = self.save() {
            self.records = self.saved.clone();
            return Err(error);
        }
        self.saved = self.records.clone();
        tracing::debug!(path = %self.path.display(), records = self.records.len(), "mapping store saved");
        Ok(())
    }
}
