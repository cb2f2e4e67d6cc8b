//! Persisted mapping records and their composite identity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, Result};
use crate::physical::ObjectKind;

/// Similarity scorer used to compare a documented name with physical column names.
///
/// Resolved once from configuration; an unrecognised name is rejected up front.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum MatchStrategy {
    #[serde(rename = "RATIO")]
    Ratio,
    #[serde(rename = "PARTIAL_RATIO")]
    PartialRatio,
    #[serde(rename = "TOKEN_SORT_RATIO")]
    TokenSortRatio,
    #[default]
    #[serde(rename = "TOKEN_SET_RATIO")]
    TokenSetRatio,
    #[serde(rename = "WRATIO")]
    WRatio,
    #[serde(rename = "QRATIO")]
    QRatio,
}

impl MatchStrategy {
    pub const ALL: [MatchStrategy; 6] = [
        MatchStrategy::Ratio,
        MatchStrategy::PartialRatio,
        MatchStrategy::TokenSortRatio,
        MatchStrategy::TokenSetRatio,
        MatchStrategy::WRatio,
        MatchStrategy::QRatio,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Ratio => "RATIO",
            MatchStrategy::PartialRatio => "PARTIAL_RATIO",
            MatchStrategy::TokenSortRatio => "TOKEN_SORT_RATIO",
            MatchStrategy::TokenSetRatio => "TOKEN_SET_RATIO",
            MatchStrategy::WRatio => "WRATIO",
            MatchStrategy::QRatio => "QRATIO",
        }
    }
}

impl fmt::Display for MatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchStrategy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "RATIO" => Ok(MatchStrategy::Ratio),
            "PARTIAL_RATIO" => Ok(MatchStrategy::PartialRatio),
            "TOKEN_SORT_RATIO" => Ok(MatchStrategy::TokenSortRatio),
            "TOKEN_SET_RATIO" => Ok(MatchStrategy::TokenSetRatio),
            "WRATIO" | "W_RATIO" => Ok(MatchStrategy::WRatio),
            "QRATIO" | "Q_RATIO" => Ok(MatchStrategy::QRatio),
            _ => Err(ModelError::UnknownStrategy(s.to_string())),
        }
    }
}

/// State of a mapping record.
///
/// A documented column with no record at all is implicitly unmapped.
/// [`MappingStatus::Unmapped`] is only stored for a record whose manual
/// override was cleared and which awaits re-evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingStatus {
    Unmapped,
    MappedExact,
    MappedFuzzy,
    UnmappedLowScore,
    UnmappedNotExact,
    MappedUserOverride,
    InactiveOrphaned,
}

impl MappingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MappingStatus::Unmapped => "UNMAPPED",
            MappingStatus::MappedExact => "MAPPED_EXACT",
            MappingStatus::MappedFuzzy => "MAPPED_FUZZY",
            MappingStatus::UnmappedLowScore => "UNMAPPED_LOW_SCORE",
            MappingStatus::UnmappedNotExact => "UNMAPPED_NOT_EXACT",
            MappingStatus::MappedUserOverride => "MAPPED_USER_OVERRIDE",
            MappingStatus::InactiveOrphaned => "INACTIVE_ORPHANED",
        }
    }

    /// Statuses produced by a successful automatic match. Only these are
    /// eligible for the unchanged-definition skip.
    pub fn is_automatic_match(&self) -> bool {
        matches!(self, MappingStatus::MappedExact | MappingStatus::MappedFuzzy)
    }

    /// Whether the record currently names a physical column.
    pub fn is_mapped(&self) -> bool {
        matches!(
            self,
            MappingStatus::MappedExact
                | MappingStatus::MappedFuzzy
                | MappingStatus::MappedUserOverride
        )
    }
}

impl fmt::Display for MappingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MappingStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "UNMAPPED" => Ok(MappingStatus::Unmapped),
            "MAPPED_EXACT" => Ok(MappingStatus::MappedExact),
            "MAPPED_FUZZY" => Ok(MappingStatus::MappedFuzzy),
            "UNMAPPED_LOW_SCORE" => Ok(MappingStatus::UnmappedLowScore),
            "UNMAPPED_NOT_EXACT" => Ok(MappingStatus::UnmappedNotExact),
            "MAPPED_USER_OVERRIDE" => Ok(MappingStatus::MappedUserOverride),
            "INACTIVE_ORPHANED" => Ok(MappingStatus::InactiveOrphaned),
            _ => Err(ModelError::UnknownStatus(s.to_string())),
        }
    }
}

/// The (page, physical object, environment) scope a group of records shares.
///
/// Orphan detection compares all active records of one scope against the
/// page's documented set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingScope {
    pub page_id: String,
    pub fqdn: String,
    pub environment: String,
    pub object_kind: ObjectKind,
}

impl MappingScope {
    pub fn new(
        page_id: impl Into<String>,
        fqdn: impl Into<String>,
        environment: impl Into<String>,
        object_kind: ObjectKind,
    ) -> Self {
        Self {
            page_id: page_id.into(),
            fqdn: fqdn.into(),
            environment: environment.into(),
            object_kind,
        }
    }

    /// Key of the record for `target_field_name` within this scope.
    pub fn key(&self, target_field_name: impl Into<String>) -> MappingKey {
        MappingKey {
            page_id: self.page_id.clone(),
            target_field_name: target_field_name.into(),
            fqdn: self.fqdn.clone(),
            environment: self.environment.clone(),
            object_kind: self.object_kind,
        }
    }
}

impl fmt::Display for MappingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "page {} / {} / {} ({})",
            self.page_id, self.environment, self.fqdn, self.object_kind
        )
    }
}

/// Five-part identity of a [`MappingRecord`]. At most one record exists per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MappingKey {
    pub page_id: String,
    pub target_field_name: String,
    pub fqdn: String,
    pub environment: String,
    pub object_kind: ObjectKind,
}

impl MappingKey {
    pub fn new(
        page_id: impl Into<String>,
        target_field_name: impl Into<String>,
        fqdn: impl Into<String>,
        environment: impl Into<String>,
        object_kind: ObjectKind,
    ) -> Self {
        Self {
            page_id: page_id.into(),
            target_field_name: target_field_name.into(),
            fqdn: fqdn.into(),
            environment: environment.into(),
            object_kind,
        }
    }

    /// Reject keys with blank text components.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("page_id", &self.page_id),
            ("target_field_name", &self.target_field_name),
            ("fqdn", &self.fqdn),
            ("environment", &self.environment),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(ModelError::EmptyKeyField(name));
            }
        }
        Ok(())
    }

    pub fn scope(&self) -> MappingScope {
        MappingScope {
            page_id: self.page_id.clone(),
            fqdn: self.fqdn.clone(),
            environment: self.environment.clone(),
            object_kind: self.object_kind,
        }
    }
}

impl fmt::Display for MappingKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}@{} ({})",
            self.page_id, self.target_field_name, self.fqdn, self.environment, self.object_kind
        )
    }
}

/// Persisted decision about which physical column a documented column maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingRecord {
    #[serde(flatten)]
    pub key: MappingKey,
    pub matched_column: Option<String>,
    /// Similarity score in `0.0..=100.0`.
    pub match_score: Option<f64>,
    pub match_strategy: Option<MatchStrategy>,
    pub status: MappingStatus,
    /// Fingerprint of the physical definition when the mapping was last computed.
    pub ddl_hash_at_mapping: String,
    /// Set only by a human edit; the automatic procedure never changes `matched_column` while set.
    pub user_override: bool,
    /// False only for orphaned records.
    pub is_active: bool,
    #[serde(default)]
    pub notes: String,
    pub last_mapped_on: DateTime<Utc>,
}

impl MappingRecord {
    /// A fresh, active, automatic record with no match yet.
    pub fn new(key: MappingKey, now: DateTime<Utc>) -> Self {
        Self {
            key,
            matched_column: None,
            match_score: None,
            match_strategy: None,
            status: MappingStatus::Unmapped,
            ddl_hash_at_mapping: String::new(),
            user_override: false,
            is_active: true,
            notes: String::new(),
            last_mapped_on: now,
        }
    }

    pub fn scope(&self) -> MappingScope {
        self.key.scope()
    }
}
