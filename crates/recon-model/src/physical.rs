//! Physical warehouse objects and their columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;

/// Kind of physical object a logical source resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ObjectKind {
    Table,
    View,
    MaterializedView,
    DynamicTable,
    ExternalTable,
}

impl ObjectKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Table => "TABLE",
            ObjectKind::View => "VIEW",
            ObjectKind::MaterializedView => "MATERIALIZED_VIEW",
            ObjectKind::DynamicTable => "DYNAMIC_TABLE",
            ObjectKind::ExternalTable => "EXTERNAL_TABLE",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = ModelError;

    /// Accepts `MATERIALIZED VIEW`, `materialized-view` and `MATERIALIZED_VIEW` alike.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "TABLE" | "BASE_TABLE" => Ok(ObjectKind::Table),
            "VIEW" => Ok(ObjectKind::View),
            "MATERIALIZED_VIEW" => Ok(ObjectKind::MaterializedView),
            "DYNAMIC_TABLE" => Ok(ObjectKind::DynamicTable),
            "EXTERNAL_TABLE" => Ok(ObjectKind::ExternalTable),
            _ => Err(ModelError::UnknownObjectKind(s.to_string())),
        }
    }
}

/// A column present in a physical object's current definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhysicalColumn {
    /// Canonical upper-case column name.
    pub name: String,
    /// Type text as written in the definition; empty when the definition has none.
    pub data_type: String,
}

impl PhysicalColumn {
    pub fn new(name: impl AsRef<str>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.as_ref().trim().to_uppercase(),
            data_type: data_type.into(),
        }
    }
}

/// Result of resolving a logical source for one environment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalTarget {
    /// Fully-qualified identifier (`database.schema.object`).
    pub fqdn: String,
    pub object_kind: ObjectKind,
}

impl PhysicalTarget {
    pub fn new(fqdn: impl Into<String>, object_kind: ObjectKind) -> Self {
        Self {
            fqdn: fqdn.into(),
            object_kind,
        }
    }
}

impl fmt::Display for PhysicalTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.fqdn, self.object_kind)
    }
}

/// Current physical definition text of an object and its fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefinitionSnapshot {
    pub hash: String,
    pub text: String,
}

impl DefinitionSnapshot {
    pub fn new(hash: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            hash: hash.into(),
            text: text.into(),
        }
    }

    /// True when there is nothing to match against.
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() || self.hash.trim().is_empty()
    }
}
