//! Error types for loading collaborator inputs.

use std::path::PathBuf;

use recon_map::CollaboratorError;
use thiserror::Error;

/// Errors that can occur while loading documentation, resolver or catalog files.
#[derive(Debug, Error)]
pub enum IngestError {
    // === File System Errors ===
    /// Input file does not exist.
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    /// Failed to read file.
    #[error("failed to read file {path}: {source}")]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // === Parse Errors ===
    /// File is not valid JSON or does not have the expected shape.
    #[error("failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A field holds a value outside its domain.
    #[error("invalid {field} value '{value}' in {path}")]
    InvalidValue {
        field: String,
        value: String,
        path: PathBuf,
    },

    /// The same logical name is claimed by two resolver entries.
    #[error("source name '{name}' is defined more than once in {path}")]
    DuplicateSource { name: String, path: PathBuf },
}

impl IngestError {
    /// Convert a load failure into an unavailable collaborator: nothing can be
    /// served from an input that failed to load.
    pub fn into_unavailable(self, collaborator: &'static str) -> CollaboratorError {
        CollaboratorError::unavailable(collaborator, self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IngestError>;
