//! TOML configuration for `column-recon`.
//!
//! ```toml
//! environments = ["DEV", "QA", "PROD"]
//!
//! [matcher]
//! match_threshold = 80
//! match_strategy = "TOKEN_SET_RATIO"
//! exact_match_only = false
//!
//! [documentation]
//! table_id = "table_1"
//! verified_only = true
//!
//! [paths]
//! documentation = "pages.json"
//! mappings = "mappings.json"
//! ```
//!
//! Every section is optional except `environments`. Relative paths resolve
//! against the directory holding the configuration file.

use std::fs;
use std::path::{Path, PathBuf};

use recon_ingest::{DEFAULT_TABLE_ID, DocumentationOptions};
use recon_map::{ConfigError, DEFAULT_MATCH_THRESHOLD, EngineConfig, MatcherConfig};
use recon_model::MatchStrategy;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("configuration file not found: {path}")]
    NotFound { path: PathBuf },
    #[error("failed to read configuration file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration in {path}")]
    Invalid {
        path: PathBuf,
        #[source]
        source: ConfigError,
    },
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    environments: Vec<String>,
    #[serde(default)]
    matcher: RawMatcher,
    #[serde(default)]
    documentation: RawDocumentation,
    #[serde(default)]
    paths: RawPaths,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawMatcher {
    /// Kept untyped so a non-integer reports a configuration error, not a parse error.
    match_threshold: Option<toml::Value>,
    match_strategy: Option<String>,
    exact_match_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawDocumentation {
    table_id: Option<String>,
    verified_only: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawPaths {
    documentation: Option<PathBuf>,
    definitions: Option<PathBuf>,
    resolver: Option<PathBuf>,
    data_types: Option<PathBuf>,
    mappings: Option<PathBuf>,
}

/// Input and store locations, already resolved against the config directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPaths {
    pub documentation: PathBuf,
    pub definitions: PathBuf,
    pub resolver: PathBuf,
    /// Optional input; type resolution is skipped when the file is absent.
    pub data_types: PathBuf,
    pub mappings: PathBuf,
}

impl InputPaths {
    fn resolve(raw: RawPaths, base: &Path) -> Self {
        let join = |path: Option<PathBuf>, default: &str| {
            let path = path.unwrap_or_else(|| PathBuf::from(default));
            if path.is_absolute() {
                path
            } else {
                base.join(path)
            }
        };
        Self {
            documentation: join(raw.documentation, "pages.json"),
            definitions: join(raw.definitions, "definitions.json"),
            resolver: join(raw.resolver, "fqdn_resolver.json"),
            data_types: join(raw.data_types, "data_types.json"),
            mappings: join(raw.mappings, "mappings.json"),
        }
    }
}

/// Validated application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub source: PathBuf,
    pub engine: EngineConfig,
    pub documentation: DocumentationOptions,
    pub paths: InputPaths,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, AppConfigError> {
        if !path.exists() {
            return Err(AppConfigError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let text = fs::read_to_string(path).map_err(|source| AppConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let config = Self::parse(&text, base).map_err(|error| match error {
            AppConfigError::Parse { source, .. } => AppConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            AppConfigError::Invalid { source, .. } => AppConfigError::Invalid {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        tracing::info!(
            path = %path.display(),
            environments = ?config.engine.environments,
            strategy = %config.engine.matcher.match_strategy,
            threshold = config.engine.matcher.match_threshold,
            "loaded configuration"
        );
        Ok(Self {
            source: path.to_path_buf(),
            ..config
        })
    }

    /// Parse configuration text, resolving relative paths against `base`.
    pub fn parse(text: &str, base: &Path) -> Result<Self, AppConfigError> {
        let raw: RawConfig = toml::from_str(text).map_err(|source| AppConfigError::Parse {
            path: PathBuf::new(),
            source,
        })?;
        let invalid = |source: ConfigError| AppConfigError::Invalid {
            path: PathBuf::new(),
            source,
        };

        let threshold = match raw.matcher.match_threshold {
            None => i64::from(DEFAULT_MATCH_THRESHOLD),
            Some(toml::Value::Integer(value)) => value,
            Some(other) => return Err(invalid(ConfigError::InvalidThreshold(other.to_string()))),
        };
        let strategy = raw
            .matcher
            .match_strategy
            .unwrap_or_else(|| MatchStrategy::default().to_string());
        let matcher = MatcherConfig::from_raw(
            threshold,
            &strategy,
            raw.matcher.exact_match_only.unwrap_or(false),
        )
        .map_err(invalid)?;
        let engine = EngineConfig::new(matcher, raw.environments).map_err(invalid)?;

        let defaults = DocumentationOptions::default();
        let documentation = DocumentationOptions {
            table_id: raw
                .documentation
                .table_id
                .filter(|id| !id.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_TABLE_ID.to_string()),
            verified_only: raw
                .documentation
                .verified_only
                .unwrap_or(defaults.verified_only),
        };

        Ok(Self {
            source: PathBuf::new(),
            engine,
            documentation,
            paths: InputPaths::resolve(raw.paths, base),
        })
    }
}
