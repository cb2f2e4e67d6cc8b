//! Catalog of physical definition snapshots.
//!
//! A JSON list of `{fqdn, environment, object_kind, ddl, ddl_hash?}` entries,
//! typically exported from the warehouse information schema. An entry may
//! also carry `previous_ddl_hash` from the export before, which the parity
//! report uses to flag changed definitions.

use std::collections::BTreeMap;
use std::path::Path;

use recon_map::{CollaboratorError, DefinitionSource};
use recon_model::{DefinitionSnapshot, ObjectKind, PhysicalTarget};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{IngestError, Result};
use crate::json::read_json;

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    fqdn: String,
    environment: String,
    #[serde(default)]
    object_kind: Option<String>,
    #[serde(default)]
    ddl: Option<String>,
    #[serde(default)]
    ddl_hash: Option<String>,
    #[serde(default)]
    previous_ddl_hash: Option<String>,
}

/// Hex SHA-256 fingerprint of a definition text.
pub fn definition_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

/// (upper-case fqdn, upper-case environment, kind if exported)
type SnapshotKey = (String, String, Option<ObjectKind>);

/// One exported definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotEntry {
    pub fqdn: String,
    pub environment: String,
    /// `None` when the export did not say.
    pub object_kind: Option<ObjectKind>,
    pub snapshot: DefinitionSnapshot,
    pub previous_hash: Option<String>,
}

impl SnapshotEntry {
    /// Previous hash when it differs from the current one.
    pub fn changed_from(&self) -> Option<&str> {
        self.previous_hash
            .as_deref()
            .filter(|previous| *previous != self.snapshot.hash)
    }
}

/// Definition snapshots keyed by fqdn, environment and object kind.
#[derive(Debug, Clone, Default)]
pub struct SnapshotCatalog {
    entries: BTreeMap<SnapshotKey, SnapshotEntry>,
}

fn normalize(text: &str) -> String {
    text.trim().to_uppercase()
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl SnapshotCatalog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw: Vec<RawSnapshot> = read_json(path)?;
        let mut catalog = Self::default();
        for entry in raw {
            let object_kind = entry
                .object_kind
                .as_deref()
                .filter(|k| !k.trim().is_empty())
                .map(|k| {
                    k.parse().map_err(|_| IngestError::InvalidValue {
                        field: "object_kind".to_string(),
                        value: k.to_string(),
                        path: path.to_path_buf(),
                    })
                })
                .transpose()?;
            catalog.insert(
                &entry.fqdn,
                &entry.environment,
                object_kind,
                entry.ddl.unwrap_or_default(),
                entry.ddl_hash,
            );
            if let Some(previous) = non_blank(entry.previous_ddl_hash) {
                let key = (
                    normalize(&entry.fqdn),
                    normalize(&entry.environment),
                    object_kind,
                );
                if let Some(stored) = catalog.entries.get_mut(&key) {
                    stored.previous_hash = Some(previous);
                }
            }
        }
        tracing::info!(
            path = %path.display(),
            definitions = catalog.len(),
            "loaded definition snapshots"
        );
        Ok(catalog)
    }

    /// Add a snapshot, computing the hash when none is given. Replaces an
    /// entry with the same fqdn, environment and kind.
    pub fn insert(
        &mut self,
        fqdn: &str,
        environment: &str,
        object_kind: Option<ObjectKind>,
        ddl: String,
        ddl_hash: Option<String>,
    ) {
        let hash = non_blank(ddl_hash).unwrap_or_else(|| definition_hash(&ddl));
        let entry = SnapshotEntry {
            fqdn: normalize(fqdn),
            environment: normalize(environment),
            object_kind,
            snapshot: DefinitionSnapshot::new(hash, ddl),
            previous_hash: None,
        };
        self.entries.insert(
            (entry.fqdn.clone(), entry.environment.clone(), object_kind),
            entry,
        );
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every entry, ordered by fqdn, environment and kind.
    pub fn entries(&self) -> impl Iterator<Item = &SnapshotEntry> {
        self.entries.values()
    }

    /// Entries of one environment for `fqdn`, any kind.
    pub fn entries_for<'a>(
        &'a self,
        fqdn: &str,
        environment: &str,
    ) -> impl Iterator<Item = &'a SnapshotEntry> + use<'a> {
        let fqdn = normalize(fqdn);
        let environment = normalize(environment);
        self.entries
            .values()
            .filter(move |e| e.fqdn == fqdn && e.environment == environment)
    }

    /// Snapshot for `fqdn` of `kind` in `environment`.
    ///
    /// An entry exported with the same kind wins over one exported without a
    /// kind. An entry of a different kind never answers. Empty definitions
    /// count as missing.
    pub fn get(
        &self,
        fqdn: &str,
        environment: &str,
        kind: ObjectKind,
    ) -> Option<&DefinitionSnapshot> {
        let fqdn = normalize(fqdn);
        let environment = normalize(environment);
        self.entries
            .get(&(fqdn.clone(), environment.clone(), Some(kind)))
            .or_else(|| self.entries.get(&(fqdn, environment, None)))
            .map(|entry| &entry.snapshot)
            .filter(|snapshot| !snapshot.is_empty())
    }
}

impl DefinitionSource for SnapshotCatalog {
    fn definition(
        &self,
        target: &PhysicalTarget,
        environment: &str,
    ) -> std::result::Result<Option<DefinitionSnapshot>, CollaboratorError> {
        if let Some(snapshot) = self.get(&target.fqdn, environment, target.object_kind) {
            return Ok(Some(snapshot.clone()));
        }
        let other_kinds: Vec<String> = self
            .entries_for(&target.fqdn, environment)
            .filter_map(|e| e.object_kind)
            .filter(|kind| *kind != target.object_kind)
            .map(|kind| kind.to_string())
            .collect();
        if !other_kinds.is_empty() {
            tracing::warn!(
                fqdn = %target.fqdn,
                expected = %target.object_kind,
                exported = %other_kinds.join(", "),
                "definition exported only for a different object kind"
            );
        }
        Ok(None)
    }
}
