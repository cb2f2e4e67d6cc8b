//! Logical source name to physical object resolution.
//!
//! ```json
//! {"sources": {
//!   "SECURITY_MASTER": {
//!     "aliases": ["SEC_MASTER"],
//!     "default": {"fqdn": "ANALYTICS_{ENV}.CORE.SECURITY_MASTER", "object_kind": "VIEW"},
//!     "environments": {"PROD": {"fqdn": "ANALYTICS.CORE.SECURITY_MASTER", "object_kind": "TABLE"}}
//!   }
//! }}
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use recon_map::{CollaboratorError, TargetResolver};
use recon_model::{ObjectKind, PhysicalTarget};
use serde::{Deserialize, Serialize};

use crate::error::{IngestError, Result};
use crate::json::read_json;

const ENV_PLACEHOLDER: &str = "{ENV}";

#[derive(Debug, Deserialize)]
struct RawResolverFile {
    #[serde(default)]
    sources: BTreeMap<String, RawSource>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    #[serde(default)]
    aliases: Vec<String>,
    #[serde(default)]
    default: Option<RawTarget>,
    #[serde(default)]
    environments: BTreeMap<String, RawTarget>,
}

#[derive(Debug, Deserialize)]
struct RawTarget {
    fqdn: String,
    #[serde(default = "default_kind")]
    object_kind: String,
}

fn default_kind() -> String {
    ObjectKind::Table.to_string()
}

/// Resolution rules of one logical source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceEntry {
    /// Canonical upper-case name as written in the file.
    pub name: String,
    pub default: Option<PhysicalTarget>,
    /// Keyed by upper-case environment name.
    pub environments: BTreeMap<String, PhysicalTarget>,
}

impl SourceEntry {
    fn resolve(&self, environment: &str) -> Option<PhysicalTarget> {
        let environment = environment.trim().to_uppercase();
        if let Some(target) = self.environments.get(&environment) {
            return Some(target.clone());
        }
        self.default.as_ref().map(|target| {
            PhysicalTarget::new(
                target.fqdn.replace(ENV_PLACEHOLDER, &environment),
                target.object_kind,
            )
        })
    }

    fn describe(&self) -> String {
        let mut targets: Vec<String> = Vec::new();
        if let Some(default) = &self.default {
            targets.push(default.fqdn.clone());
        }
        targets.extend(
            self.environments
                .iter()
                .map(|(env, target)| format!("{env}: {}", target.fqdn)),
        );
        targets.join(", ")
    }
}

/// Case-insensitive, environment-aware source resolver.
#[derive(Debug, Clone, Default)]
pub struct FqdnResolver {
    entries: Vec<SourceEntry>,
    /// Upper-cased name or alias to entry index.
    index: BTreeMap<String, usize>,
}

impl FqdnResolver {
    pub fn load(path: &Path) -> Result<Self> {
        let raw: RawResolverFile = read_json(path)?;
        let resolver = Self::from_raw(raw, path)?;
        tracing::info!(
            path = %path.display(),
            sources = resolver.entries.len(),
            "loaded source resolver"
        );
        Ok(resolver)
    }

    fn from_raw(raw: RawResolverFile, path: &Path) -> Result<Self> {
        let mut resolver = Self::default();
        for (name, source) in raw.sources {
            let parse_target = |target: RawTarget| -> Result<PhysicalTarget> {
                let object_kind =
                    target
                        .object_kind
                        .parse()
                        .map_err(|_| IngestError::InvalidValue {
                            field: "object_kind".to_string(),
                            value: target.object_kind.clone(),
                            path: path.to_path_buf(),
                        })?;
                Ok(PhysicalTarget::new(target.fqdn.trim(), object_kind))
            };

            let default = source.default.map(&parse_target).transpose()?;
            let mut environments = BTreeMap::new();
            for (env, target) in source.environments {
                environments.insert(env.trim().to_uppercase(), parse_target(target)?);
            }
            let entry = SourceEntry {
                name: name.trim().to_uppercase(),
                default,
                environments,
            };

            let position = resolver.entries.len();
            let names = std::iter::once(entry.name.clone())
                .chain(source.aliases.iter().map(|a| a.trim().to_uppercase()))
                .filter(|n| !n.is_empty());
            for lookup in names {
                if resolver.index.insert(lookup.clone(), position).is_some() {
                    return Err(IngestError::DuplicateSource {
                        name: lookup,
                        path: path.to_path_buf(),
                    });
                }
            }
            resolver.entries.push(entry);
        }
        Ok(resolver)
    }

    pub fn entries(&self) -> &[SourceEntry] {
        &self.entries
    }

    pub fn entry(&self, logical_source: &str) -> Option<&SourceEntry> {
        self.index
            .get(&logical_source.trim().to_uppercase())
            .map(|&i| &self.entries[i])
    }

    /// Resolve `logical_source` for `environment`; `None` when absent there.
    pub fn lookup(&self, logical_source: &str, environment: &str) -> Option<PhysicalTarget> {
        self.entry(logical_source)?.resolve(environment)
    }

    /// Compare documented source tables against the resolver entries.
    pub fn validate_sources<I, S>(&self, documented_sources: I) -> SourceValidation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut report = SourceValidation::default();
        let mut used = BTreeSet::new();
        let sources: BTreeSet<String> = documented_sources
            .into_iter()
            .map(|s| s.as_ref().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        for source in sources {
            match self.index.get(&source.to_uppercase()) {
                Some(&i) => {
                    used.insert(i);
                    report.mapped.push(MappedSource {
                        source,
                        entry: self.entries[i].name.clone(),
                        targets: self.entries[i].describe(),
                    });
                }
                None => report.unmapped.push(source),
            }
        }
        report.unused = self
            .entries
            .iter()
            .enumerate()
            .filter(|(i, _)| !used.contains(i))
            .map(|(_, entry)| format!("{} -> {}", entry.name, entry.describe()))
            .collect();
        report
    }
}

impl TargetResolver for FqdnResolver {
    fn resolve(
        &self,
        logical_source: &str,
        environment: &str,
    ) -> std::result::Result<Option<PhysicalTarget>, CollaboratorError> {
        Ok(self.lookup(logical_source, environment))
    }
}

/// A documented source that the resolver knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappedSource {
    pub source: String,
    pub entry: String,
    pub targets: String,
}

/// Result of [`FqdnResolver::validate_sources`]; every list is sorted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SourceValidation {
    pub mapped: Vec<MappedSource>,
    /// Documented sources with no resolver entry.
    pub unmapped: Vec<String>,
    /// Resolver entries no documented source refers to.
    pub unused: Vec<String>,
}

impl SourceValidation {
    pub fn is_complete(&self) -> bool {
        self.unmapped.is_empty()
    }
}
