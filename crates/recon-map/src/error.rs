//! Error types for reconciliation.
//!
//! Unit-local failures ([`StoreError`], [`CollaboratorError::Failed`]) are
//! recovered by the engine and recorded in the run report. Everything that
//! invalidates the whole run surfaces as a [`ReconError`].

use std::path::PathBuf;

use recon_model::ModelError;
use thiserror::Error;

/// Invalid matcher configuration. Always fatal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error(transparent)]
    Strategy(#[from] ModelError),
    #[error("match threshold must be an integer, got '{0}'")]
    InvalidThreshold(String),
    #[error("no environments configured")]
    NoEnvironments,
}

/// Mapping store failure.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to {operation} mapping store at {path}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("mapping store at {path} is not valid JSON")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize mapping records")]
    Serialization(#[source] serde_json::Error),
    #[error("invalid mapping key: {0}")]
    InvalidKey(#[from] ModelError),
    #[error("no mapping record for {0}")]
    NotFound(String),
}

/// Failure reported by an external collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CollaboratorError {
    /// The collaborator cannot serve any request; the run is aborted.
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: &'static str,
        message: String,
    },
    /// A single request failed; only the affected unit is skipped.
    #[error("{collaborator} failed: {message}")]
    Failed {
        collaborator: &'static str,
        message: String,
    },
}

impl CollaboratorError {
    pub fn unavailable(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            message: message.into(),
        }
    }

    pub fn failed(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            collaborator,
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Errors that abort a reconciliation run.
#[derive(Debug, Error)]
pub enum ReconError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    CollaboratorUnavailable(CollaboratorError),
    #[error("mapping store unavailable: {0}")]
    Store(#[source] StoreError),
}

pub type Result<T> = std::result::Result<T, ReconError>;
