//! Seams to the external collaborators the engine consumes.
//!
//! Implementations return [`CollaboratorError::Unavailable`] when they cannot
//! serve anything at all (the run is aborted) and
//! [`CollaboratorError::Failed`] for a failure that only affects one request.

use recon_model::{DefinitionSnapshot, DocumentedPage, PhysicalColumn, PhysicalTarget};

use crate::error::CollaboratorError;

/// Source of parsed documentation pages.
pub trait DocumentationSource {
    /// Identifiers of every page eligible for mapping.
    fn page_ids(&self) -> Result<Vec<String>, CollaboratorError>;

    /// The complete current column list of one page.
    fn documented_page(&self, page_id: &str) -> Result<DocumentedPage, CollaboratorError>;
}

/// Resolves a logical source name to a physical object for one environment.
pub trait TargetResolver {
    /// Must match `logical_source` case-insensitively. `None` means the
    /// object is legitimately absent from that environment.
    fn resolve(
        &self,
        logical_source: &str,
        environment: &str,
    ) -> Result<Option<PhysicalTarget>, CollaboratorError>;
}

/// Current physical definitions of warehouse objects.
pub trait DefinitionSource {
    fn definition(
        &self,
        target: &PhysicalTarget,
        environment: &str,
    ) -> Result<Option<DefinitionSnapshot>, CollaboratorError>;
}

/// Extracts the ordered column list from a physical definition.
pub trait ColumnExtractor {
    fn extract_columns(&self, definition: &str) -> Result<Vec<PhysicalColumn>, CollaboratorError>;
}

/// Maps a documented type string to a warehouse type.
///
/// Optional; when provided the resolved type is echoed into mapping notes.
pub trait TypeResolver {
    /// Returns the resolved type and any warnings about the documented text.
    fn resolve_type(&self, documented_type: &str) -> (String, Vec<String>);
}

/// The collaborators one engine instance works with.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub documentation: &'a dyn DocumentationSource,
    pub resolver: &'a dyn TargetResolver,
    pub definitions: &'a dyn DefinitionSource,
    pub extractor: &'a dyn ColumnExtractor,
    pub types: Option<&'a dyn TypeResolver>,
}
