//! Documentation pages produced by the page parser.
//!
//! ```json
//! {"pages": [{"page_id": "123", "title": "...", "verified": true,
//!             "tables": [{"id": "table_1", "columns": [ ... ]}]}]}
//! ```
//!
//! Only the configured table block of each page is read. Columns without a
//! target field name are dropped; every remaining column is part of the
//! page's documented set, whether or not it is marked for mapping.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use recon_map::{CollaboratorError, DocumentationSource};
use recon_model::{DocumentedColumn, DocumentedPage};
use serde::Deserialize;

use crate::error::Result;
use crate::json::read_json;

pub const DEFAULT_TABLE_ID: &str = "table_1";

/// Which parts of the parsed documentation are mapped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentationOptions {
    pub table_id: String,
    /// Skip pages that have not been marked verified.
    pub verified_only: bool,
}

impl Default for DocumentationOptions {
    fn default() -> Self {
        Self {
            table_id: DEFAULT_TABLE_ID.to_string(),
            verified_only: true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    pages: Vec<RawPage>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PageId {
    Text(String),
    Number(u64),
}

impl PageId {
    fn into_string(self) -> String {
        match self {
            PageId::Text(text) => text.trim().to_string(),
            PageId::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPage {
    page_id: PageId,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    verified: bool,
    #[serde(default)]
    tables: Vec<RawTable>,
}

#[derive(Debug, Deserialize)]
struct RawTable {
    #[serde(default)]
    id: String,
    #[serde(default)]
    columns: Vec<DocumentedColumn>,
}

/// All mappable documentation pages, in file order.
#[derive(Debug, Clone, Default)]
pub struct PageCatalog {
    pages: Vec<DocumentedPage>,
}

impl PageCatalog {
    pub fn load(path: &Path, options: &DocumentationOptions) -> Result<Self> {
        let raw: RawDocument = read_json(path)?;
        let total = raw.pages.len();
        let catalog = Self::from_raw(raw, options);
        tracing::info!(
            path = %path.display(),
            pages = catalog.pages.len(),
            skipped = total - catalog.pages.len(),
            table_id = %options.table_id,
            "loaded documentation pages"
        );
        Ok(catalog)
    }

    pub fn from_pages(pages: Vec<DocumentedPage>) -> Self {
        Self { pages }
    }

    fn from_raw(raw: RawDocument, options: &DocumentationOptions) -> Self {
        let mut pages = Vec::new();
        for page in raw.pages {
            let page_id = page.page_id.into_string();
            if page_id.is_empty() {
                tracing::warn!("page without id skipped");
                continue;
            }
            if options.verified_only && !page.verified {
                tracing::debug!(page_id = %page_id, "page not verified; skipped");
                continue;
            }
            let Some(table) = page.tables.into_iter().find(|t| t.id == options.table_id) else {
                tracing::debug!(page_id = %page_id, table_id = %options.table_id, "page has no mapping table");
                continue;
            };
            let columns: Vec<DocumentedColumn> = table
                .columns
                .into_iter()
                .filter(|c| !c.target_field_name.trim().is_empty())
                .map(|mut c| {
                    c.target_field_name = c.target_field_name.trim().to_string();
                    c
                })
                .collect();
            let mut documented = DocumentedPage::new(page_id, columns);
            documented.title = page.title.unwrap_or_default();
            pages.push(documented);
        }
        Self { pages }
    }

    pub fn pages(&self) -> &[DocumentedPage] {
        &self.pages
    }

    pub fn page(&self, page_id: &str) -> Option<&DocumentedPage> {
        self.pages.iter().find(|p| p.page_id == page_id)
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Distinct source tables referenced by any page.
    pub fn source_tables(&self) -> BTreeSet<String> {
        self.pages.iter().flat_map(DocumentedPage::source_tables).collect()
    }

    /// Distinct documented type strings and the pages using each one.
    pub fn documented_types(&self) -> BTreeMap<String, BTreeSet<String>> {
        let mut types: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for page in &self.pages {
            let label = if page.title.trim().is_empty() {
                format!("page {}", page.page_id)
            } else {
                page.title.trim().to_string()
            };
            for column in &page.columns {
                let documented_type = column.documented_type.trim();
                if !documented_type.is_empty() {
                    types
                        .entry(documented_type.to_string())
                        .or_default()
                        .insert(label.clone());
                }
            }
        }
        types
    }
}

impl DocumentationSource for PageCatalog {
    fn page_ids(&self) -> std::result::Result<Vec<String>, CollaboratorError> {
        Ok(self.pages.iter().map(|p| p.page_id.clone()).collect())
    }

    fn documented_page(&self, page_id: &str) -> std::result::Result<DocumentedPage, CollaboratorError> {
        self.page(page_id)
            .cloned()
            .ok_or_else(|| CollaboratorError::failed("documentation", format!("unknown page {page_id}")))
    }
}
