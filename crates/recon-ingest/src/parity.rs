//! Cross-environment parity of definition snapshots.
//!
//! Snapshots of the same fqdn in two environments are paired by object kind
//! and compared by hash. Entries whose export also carries a previous hash
//! that differs from the current one are listed as changed definitions.
//! Definition text diffs are not produced.

use std::collections::BTreeSet;
use std::fmt;
use std::fmt::Write as _;

use recon_model::ObjectKind;
use serde::Serialize;

use crate::snapshots::{SnapshotCatalog, SnapshotEntry};

/// Outcome of comparing one fqdn across the two environments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParityStatus {
    Match,
    HashMismatch,
    KindMismatch,
    MissingInTarget,
    MissingInSource,
}

impl ParityStatus {
    pub fn is_match(self) -> bool {
        self == ParityStatus::Match
    }
}

impl fmt::Display for ParityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParityStatus::Match => "match",
            ParityStatus::HashMismatch => "hash mismatch",
            ParityStatus::KindMismatch => "kind mismatch",
            ParityStatus::MissingInTarget => "missing in target",
            ParityStatus::MissingInSource => "missing in source",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParityRow {
    pub fqdn: String,
    pub source_kind: Option<ObjectKind>,
    pub target_kind: Option<ObjectKind>,
    pub source_hash: Option<String>,
    pub target_hash: Option<String>,
    pub status: ParityStatus,
}

/// A definition whose hash moved since the previous export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangedDefinition {
    pub fqdn: String,
    pub environment: String,
    pub object_kind: Option<ObjectKind>,
    pub previous_hash: String,
    pub current_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParityReport {
    pub source_env: String,
    pub target_env: String,
    pub rows: Vec<ParityRow>,
    pub changes: Vec<ChangedDefinition>,
}

impl ParityReport {
    pub fn count(&self, status: ParityStatus) -> usize {
        self.rows.iter().filter(|r| r.status == status).count()
    }

    /// No differences between the environments and no changed definitions.
    pub fn is_clean(&self) -> bool {
        self.changes.is_empty() && self.rows.iter().all(|r| r.status.is_match())
    }

    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "# Definition parity report ({} vs {})\n",
            self.source_env, self.target_env
        );

        let _ = writeln!(out, "## Changed definitions\n");
        if self.changes.is_empty() {
            let _ = writeln!(out, "No definition changed since the previous export.\n");
        } else {
            let _ = writeln!(out, "| FQDN | Environment | Kind | Previous hash | Current hash |");
            let _ = writeln!(out, "|---|---|---|---|---|");
            for change in &self.changes {
                let _ = writeln!(
                    out,
                    "| {} | {} | {} | `{}` | `{}` |",
                    change.fqdn,
                    change.environment,
                    kind_label(change.object_kind),
                    short_hash(Some(change.previous_hash.as_str())),
                    short_hash(Some(change.current_hash.as_str())),
                );
            }
            out.push('\n');
        }

        let _ = writeln!(out, "## {} vs {}\n", self.source_env, self.target_env);
        if self.rows.is_empty() {
            let _ = writeln!(out, "No definitions exported for either environment.");
            return out;
        }
        let _ = writeln!(
            out,
            "| FQDN | {src} kind | {tgt} kind | {src} hash | {tgt} hash | Status |",
            src = self.source_env,
            tgt = self.target_env,
        );
        let _ = writeln!(out, "|---|---|---|---|---|---|");
        for row in &self.rows {
            let _ = writeln!(
                out,
                "| {} | {} | {} | `{}` | `{}` | {} |",
                row.fqdn,
                kind_label(row.source_kind),
                kind_label(row.target_kind),
                short_hash(row.source_hash.as_deref()),
                short_hash(row.target_hash.as_deref()),
                row.status,
            );
        }
        out
    }
}

pub fn kind_label(kind: Option<ObjectKind>) -> String {
    kind.map_or_else(|| "-".to_string(), |k| k.to_string())
}

pub fn short_hash(hash: Option<&str>) -> &str {
    match hash {
        Some(h) => h.get(..12).unwrap_or(h),
        None => "-",
    }
}

fn kinds_compatible(a: Option<ObjectKind>, b: Option<ObjectKind>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => true,
    }
}

fn row(
    fqdn: &str,
    source: Option<&SnapshotEntry>,
    target: Option<&SnapshotEntry>,
    status: ParityStatus,
) -> ParityRow {
    ParityRow {
        fqdn: fqdn.to_string(),
        source_kind: source.and_then(|e| e.object_kind),
        target_kind: target.and_then(|e| e.object_kind),
        source_hash: source.map(|e| e.snapshot.hash.clone()),
        target_hash: target.map(|e| e.snapshot.hash.clone()),
        status,
    }
}

/// Pair the entries of one fqdn. Same-kind pairs first, then pairs where a
/// side has no kind, then the leftovers as kind mismatches.
fn compare_fqdn(
    fqdn: &str,
    source: &[&SnapshotEntry],
    target: &[&SnapshotEntry],
) -> Vec<ParityRow> {
    let mut rows = Vec::new();
    let mut source_left: Vec<&SnapshotEntry> = source.to_vec();
    let mut target_left: Vec<&SnapshotEntry> = target.to_vec();

    for exact in [true, false] {
        let mut unpaired = Vec::new();
        for s in source_left {
            let position = target_left.iter().position(|t| {
                if exact {
                    s.object_kind == t.object_kind
                } else {
                    kinds_compatible(s.object_kind, t.object_kind)
                }
            });
            match position {
                Some(index) => {
                    let t = target_left.remove(index);
                    let status = if s.snapshot.hash == t.snapshot.hash {
                        ParityStatus::Match
                    } else {
                        ParityStatus::HashMismatch
                    };
                    rows.push(row(fqdn, Some(s), Some(t), status));
                }
                None => unpaired.push(s),
            }
        }
        source_left = unpaired;
    }

    let mismatched = source_left.len().min(target_left.len());
    for (s, t) in source_left.iter().zip(&target_left) {
        rows.push(row(fqdn, Some(*s), Some(*t), ParityStatus::KindMismatch));
    }
    for s in &source_left[mismatched..] {
        rows.push(row(fqdn, Some(*s), None, ParityStatus::MissingInTarget));
    }
    for t in &target_left[mismatched..] {
        rows.push(row(fqdn, None, Some(*t), ParityStatus::MissingInSource));
    }
    rows
}

/// Compare the snapshots of `source_env` against `target_env`.
pub fn compare_environments(
    catalog: &SnapshotCatalog,
    source_env: &str,
    target_env: &str,
) -> ParityReport {
    let source_env = source_env.trim().to_uppercase();
    let target_env = target_env.trim().to_uppercase();

    let in_scope = |e: &&SnapshotEntry| e.environment == source_env || e.environment == target_env;
    let fqdns: BTreeSet<&str> = catalog
        .entries()
        .filter(in_scope)
        .map(|e| e.fqdn.as_str())
        .collect();

    let mut rows = Vec::new();
    for fqdn in fqdns {
        let source: Vec<&SnapshotEntry> = catalog.entries_for(fqdn, &source_env).collect();
        let target: Vec<&SnapshotEntry> = catalog.entries_for(fqdn, &target_env).collect();
        rows.extend(compare_fqdn(fqdn, &source, &target));
    }

    let changes = catalog
        .entries()
        .filter(in_scope)
        .filter_map(|e| {
            e.changed_from().map(|previous| ChangedDefinition {
                fqdn: e.fqdn.clone(),
                environment: e.environment.clone(),
                object_kind: e.object_kind,
                previous_hash: previous.to_string(),
                current_hash: e.snapshot.hash.clone(),
            })
        })
        .collect();

    let report = ParityReport {
        source_env,
        target_env,
        rows,
        changes,
    };
    tracing::info!(
        source = %report.source_env,
        target = %report.target_env,
        compared = report.rows.len(),
        mismatched = report.rows.iter().filter(|r| !r.status.is_match()).count(),
        changed = report.changes.len(),
        "compared definition snapshots"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog(entries: &[(&str, &str, Option<ObjectKind>, &str)]) -> SnapshotCatalog {
        let mut catalog = SnapshotCatalog::default();
        for (fqdn, env, kind, ddl) in entries {
            catalog.insert(fqdn, env, *kind, (*ddl).to_string(), None);
        }
        catalog
    }

    #[test]
    fn identical_definitions_match() {
        let catalog = catalog(&[
            ("DB.S.T", "DEV", Some(ObjectKind::Table), "create table t (a int)"),
            ("DB.S.T", "PROD", Some(ObjectKind::Table), "create table t (a int)"),
        ]);
        let report = compare_environments(&catalog, "dev", "prod");
        assert_eq!(report.source_env, "DEV");
        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].status, ParityStatus::Match);
        assert!(report.is_clean());
    }

    #[test]
    fn differing_hashes_are_reported() {
        let catalog = catalog(&[
            ("DB.S.T", "DEV", Some(ObjectKind::Table), "create table t (a int, b int)"),
            ("DB.S.T", "PROD", Some(ObjectKind::Table), "create table t (a int)"),
        ]);
        let report = compare_environments(&catalog, "DEV", "PROD");
        assert_eq!(report.rows[0].status, ParityStatus::HashMismatch);
        assert!(!report.is_clean());
    }

    #[test]
    fn one_sided_definitions_are_missing() {
        let catalog = catalog(&[
            ("DB.S.ONLY_DEV", "DEV", Some(ObjectKind::Table), "a"),
            ("DB.S.ONLY_PROD", "PROD", Some(ObjectKind::View), "b"),
            ("DB.S.OTHER_ENV", "QA", Some(ObjectKind::Table), "c"),
        ]);
        let report = compare_environments(&catalog, "DEV", "PROD");
        let statuses: Vec<_> = report.rows.iter().map(|r| (r.fqdn.as_str(), r.status)).collect();
        assert_eq!(
            statuses,
            vec![
                ("DB.S.ONLY_DEV", ParityStatus::MissingInTarget),
                ("DB.S.ONLY_PROD", ParityStatus::MissingInSource),
            ]
        );
    }

    #[test]
    fn different_kinds_are_a_kind_mismatch() {
        let catalog = catalog(&[
            ("DB.S.T", "DEV", Some(ObjectKind::Table), "x"),
            ("DB.S.T", "PROD", Some(ObjectKind::View), "x"),
        ]);
        let report = compare_environments(&catalog, "DEV", "PROD");
        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.status, ParityStatus::KindMismatch);
        assert_eq!(row.source_kind, Some(ObjectKind::Table));
        assert_eq!(row.target_kind, Some(ObjectKind::View));
    }

    #[test]
    fn same_kind_pairs_before_kindless_entries() {
        let catalog = catalog(&[
            ("DB.S.T", "DEV", Some(ObjectKind::View), "view"),
            ("DB.S.T", "PROD", None, "other"),
            ("DB.S.T", "PROD", Some(ObjectKind::View), "view"),
        ]);
        let report = compare_environments(&catalog, "DEV", "PROD");
        assert_eq!(report.count(ParityStatus::Match), 1);
        assert_eq!(report.count(ParityStatus::MissingInSource), 1);
        let missing = report
            .rows
            .iter()
            .find(|r| r.status == ParityStatus::MissingInSource)
            .unwrap();
        assert_eq!(missing.target_kind, None);
    }

    #[test]
    fn changed_definitions_are_listed() {
        let mut raw = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(
            &mut raw,
            br#"[
                {"fqdn": "db.s.t", "environment": "dev", "object_kind": "TABLE",
                 "ddl": "x", "previous_ddl_hash": "0123456789abcdef"},
                {"fqdn": "db.s.t", "environment": "prod", "object_kind": "TABLE",
                 "ddl": "x"},
                {"fqdn": "db.s.u", "environment": "dev", "ddl": "y",
                 "ddl_hash": "aaa", "previous_ddl_hash": "aaa"}
            ]"#,
        )
        .unwrap();
        let catalog = SnapshotCatalog::load(raw.path()).unwrap();
        let report = compare_environments(&catalog, "DEV", "PROD");
        assert_eq!(report.count(ParityStatus::Match), 1);
        assert_eq!(report.count(ParityStatus::MissingInTarget), 1);
        assert_eq!(report.changes.len(), 1);
        assert_eq!(report.changes[0].fqdn, "DB.S.T");
        assert_eq!(report.changes[0].environment, "DEV");
        assert_eq!(report.changes[0].previous_hash, "0123456789abcdef");
        assert!(!report.is_clean());

        let markdown = report.to_markdown();
        assert!(markdown.contains("# Definition parity report (DEV vs PROD)"));
        assert!(markdown.contains("`0123456789ab`"));
        assert!(markdown.contains("| DB.S.T | TABLE | TABLE |"));
    }
}
