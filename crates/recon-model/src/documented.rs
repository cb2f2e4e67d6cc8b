//! Column definitions as recorded in the documentation source.
//!
//! A [`DocumentedPage`] is rebuilt in full every time the documentation is
//! re-parsed. Its complete column list is the ground truth for orphan
//! detection, while only columns marked for inclusion are matched.

use std::collections::BTreeSet;

use serde::{Deserialize, Deserializer, Serialize};

/// A single documented target column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentedColumn {
    /// Logical source object the column is sourced from (resolved per environment).
    #[serde(default, deserialize_with = "deserialize_text")]
    pub source_table: String,
    /// Column name in the source object, as documented.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub source_field_name: String,
    /// Target column name; unique within a documented table block.
    #[serde(default, deserialize_with = "deserialize_text")]
    pub target_field_name: String,
    /// Data type string exactly as written in the documentation.
    #[serde(default, rename = "data_type", deserialize_with = "deserialize_text")]
    pub documented_type: String,
    #[serde(default, deserialize_with = "deserialize_inclusion_marker")]
    pub is_primary_key: bool,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub definition: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub comments: String,
    /// Derived from the tri-state `add_source_to_target` marker.
    #[serde(
        default,
        rename = "add_source_to_target",
        deserialize_with = "deserialize_inclusion_marker"
    )]
    pub include_in_mapping: bool,
}

impl DocumentedColumn {
    /// Create a column marked for inclusion with only the names filled in.
    pub fn new(source_table: impl Into<String>, target_field_name: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            source_field_name: String::new(),
            target_field_name: target_field_name.into(),
            documented_type: String::new(),
            is_primary_key: false,
            definition: String::new(),
            comments: String::new(),
            include_in_mapping: true,
        }
    }

    #[must_use]
    pub fn with_source_field(mut self, name: impl Into<String>) -> Self {
        self.source_field_name = name.into();
        self
    }

    #[must_use]
    pub fn with_type(mut self, documented_type: impl Into<String>) -> Self {
        self.documented_type = documented_type.into();
        self
    }

    #[must_use]
    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = definition.into();
        self
    }

    #[must_use]
    pub fn included(mut self, include: bool) -> Self {
        self.include_in_mapping = include;
        self
    }
}

/// Interpret an inclusion marker.
///
/// Only the string `"yes"` (any case, surrounding whitespace ignored) or a
/// boolean `true` include a column. Every other value excludes it.
pub fn is_inclusion_marker(value: &str) -> bool {
    value.trim().eq_ignore_ascii_case("yes")
}

/// Missing and `null` text cells both read as empty.
fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

fn deserialize_inclusion_marker<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Marker {
        Flag(bool),
        Text(String),
        Other(serde::de::IgnoredAny),
    }

    Ok(match Option::<Marker>::deserialize(deserializer)? {
        Some(Marker::Flag(flag)) => flag,
        Some(Marker::Text(text)) => is_inclusion_marker(&text),
        Some(Marker::Other(_)) | None => false,
    })
}

/// All documented columns of one page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentedPage {
    pub page_id: String,
    #[serde(default)]
    pub title: String,
    pub columns: Vec<DocumentedColumn>,
}

impl DocumentedPage {
    pub fn new(page_id: impl Into<String>, columns: Vec<DocumentedColumn>) -> Self {
        Self {
            page_id: page_id.into(),
            title: String::new(),
            columns,
        }
    }

    /// Target names of every documented column, included or not.
    pub fn documented_target_names(&self) -> BTreeSet<String> {
        self.columns
            .iter()
            .map(|c| c.target_field_name.clone())
            .collect()
    }

    /// Columns marked for inclusion in mapping, in documentation order.
    pub fn columns_to_map(&self) -> impl Iterator<Item = &DocumentedColumn> {
        self.columns.iter().filter(|c| c.include_in_mapping)
    }

    /// Distinct non-blank source tables referenced by the page.
    pub fn source_tables(&self) -> BTreeSet<String> {
        self.columns
            .iter()
            .map(|c| c.source_table.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}
