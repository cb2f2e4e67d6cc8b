//! File-backed collaborators for the reconciliation engine.
//!
//! Each input is a JSON file produced by an upstream export:
//! documentation pages, the source resolver map, definition snapshots and
//! the documented type map. Definition snapshots also feed the
//! cross-environment parity report.

#![deny(unsafe_code)]

pub mod datatype;
pub mod ddl;
pub mod error;
pub mod fqdn;
mod json;
pub mod pages;
pub mod parity;
pub mod snapshots;

pub use datatype::{DataTypeMap, FALLBACK_TYPE, TypeResolution};
pub use ddl::{DdlColumnExtractor, extract_columns};
pub use error::{IngestError, Result};
pub use fqdn::{FqdnResolver, MappedSource, SourceEntry, SourceValidation};
pub use pages::{DEFAULT_TABLE_ID, DocumentationOptions, PageCatalog};
pub use parity::{ChangedDefinition, ParityReport, ParityRow, ParityStatus, compare_environments};
pub use snapshots::{SnapshotCatalog, SnapshotEntry, definition_hash};
