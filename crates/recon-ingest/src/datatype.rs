//! Documented type to warehouse type resolution.
//!
//! The base-type map is a JSON object keyed by upper-case documented base
//! type, e.g. `{"INTEGER": "NUMBER", "STRING": "VARCHAR", "DATE": "DATE"}`.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::LazyLock;

use recon_map::TypeResolver;
use regex::Regex;
use serde::Serialize;

use crate::error::Result;
use crate::json::read_json;

/// Type used whenever a documented type cannot be resolved.
pub const FALLBACK_TYPE: &str = "VARCHAR(16777216)";

const NUMBER_DEFAULT: &str = "NUMBER(38,0)";
const NUMBER_FAMILY: &[&str] = &["NUMBER", "INTEGER", "INT", "DECIMAL", "NUMERIC"];
const PARAMETERISED_TARGETS: &[&str] = &["VARCHAR", "NUMBER", "DECIMAL", "CHAR", "STRING", "TEXT"];

/// Leading base name with an optional `(p)` or `(p, s)` parameter list.
static TYPE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Z_]+)\s*(\(\s*\d+(?:\s*,\s*\d+)?\s*\))?").expect("valid type regex")
});

/// Outcome of resolving one documented type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TypeResolution {
    pub documented: String,
    pub resolved: String,
    pub warnings: Vec<String>,
}

impl TypeResolution {
    /// True when the documented text was malformed or unknown.
    pub fn is_fallback(&self) -> bool {
        !self.warnings.is_empty() && self.resolved == FALLBACK_TYPE
    }
}

/// Resolves documented types through a base-type map.
#[derive(Debug, Clone, Default)]
pub struct DataTypeMap {
    bases: BTreeMap<String, String>,
}

impl DataTypeMap {
    pub fn load(path: &Path) -> Result<Self> {
        let raw: BTreeMap<String, String> = read_json(path)?;
        let map = Self::from_entries(raw);
        tracing::info!(path = %path.display(), types = map.bases.len(), "loaded data type map");
        Ok(map)
    }

    pub fn from_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        Self {
            bases: entries
                .into_iter()
                .map(|(k, v)| (k.as_ref().trim().to_uppercase(), v.into()))
                .collect(),
        }
    }

    pub fn resolve(&self, documented: &str) -> TypeResolution {
        let (resolved, warnings) = self.resolve_parts(documented);
        TypeResolution {
            documented: documented.to_string(),
            resolved,
            warnings,
        }
    }

    fn resolve_parts(&self, documented: &str) -> (String, Vec<String>) {
        let fallback = |warning: String| (FALLBACK_TYPE.to_string(), vec![warning]);

        let cleaned = documented.trim().to_uppercase();
        if cleaned.is_empty() {
            return fallback(format!("missing documented type '{documented}'"));
        }
        let cleaned = cleaned.replace("FLOAT OR NUMBER", "NUMBER");

        if cleaned.matches('(').count() != cleaned.matches(')').count() {
            return fallback(format!(
                "mismatched parentheses in type '{documented}'; defaulting to {FALLBACK_TYPE}"
            ));
        }
        let Some(captures) = TYPE_PATTERN.captures(&cleaned) else {
            return fallback(format!(
                "unrecognised type format '{documented}'; defaulting to {FALLBACK_TYPE}"
            ));
        };
        let base = captures.get(1).map_or("", |m| m.as_str());
        let params: String = captures
            .get(2)
            .map(|m| m.as_str().chars().filter(|c| !c.is_whitespace()).collect())
            .unwrap_or_default();

        let Some(target) = self.bases.get(base) else {
            return fallback(format!(
                "type '{documented}' (base '{base}') not in type map; defaulting to {FALLBACK_TYPE}"
            ));
        };

        let target_upper = target.to_uppercase();
        if target_upper == "NUMBER" && NUMBER_FAMILY.contains(&base) && params.is_empty() {
            return (NUMBER_DEFAULT.to_string(), Vec::new());
        }
        if !params.is_empty() && PARAMETERISED_TARGETS.contains(&target_upper.as_str()) {
            return (format!("{target}{params}"), Vec::new());
        }
        (target.clone(), Vec::new())
    }
}

impl TypeResolver for DataTypeMap {
    fn resolve_type(&self, documented_type: &str) -> (String, Vec<String>) {
        self.resolve_parts(documented_type)
    }
}
