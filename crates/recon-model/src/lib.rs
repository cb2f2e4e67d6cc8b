//! Data model for reconciling documented columns against physical warehouse columns.
//!
//! The types here are shared by the reconciliation engine (`recon-map`), the
//! file-backed collaborators (`recon-ingest`) and the CLI.

pub mod documented;
pub mod error;
pub mod mapping;
pub mod physical;

pub use documented::{DocumentedColumn, DocumentedPage};
pub use error::{ModelError, Result};
pub use mapping::{MappingKey, MappingRecord, MappingScope, MappingStatus, MatchStrategy};
pub use physical::{DefinitionSnapshot, ObjectKind, PhysicalColumn, PhysicalTarget};
