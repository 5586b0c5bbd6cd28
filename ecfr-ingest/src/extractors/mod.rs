//! Section extraction from regulatory XML
//!
//! One entry point, [`extract`], handles both document dialects. The caller
//! always names the dialect; documents are never sniffed.
//!
//! # Dialects
//! - [`Dialect::Hierarchical`]: full-title bulk documents, ancestry read from
//!   the nesting itself
//! - [`Dialect::FullTextByDate`]: legacy single-section documents, ancestry
//!   supplied by the caller
//!
//! Both share the text flattening in [`xml_tree`] and produce identical
//! [`SectionRecord`] shapes.

pub mod full_text;
pub mod hierarchy;
pub mod xml_tree;

use crate::error::IngestResult;
use crate::types::{AncestryPath, SectionRecord};
use chrono::NaiveDate;

/// Shape of the document handed to [`extract`]
#[derive(Debug, Clone, PartialEq)]
pub enum Dialect {
    /// Bulk title document: DIV1 → DIV3 → [DIV4] → DIV5 → [DIV6] → DIV8
    Hierarchical,
    /// Per-section document from the full-text-by-date endpoint
    FullTextByDate {
        ancestry: AncestryPath,
        /// Section identifier to use when the document does not declare one
        section: Option<String>,
    },
}

impl Dialect {
    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Hierarchical => "hierarchical",
            Dialect::FullTextByDate { .. } => "full_text_by_date",
        }
    }
}

/// Extract section records from one document
///
/// Stateless: the same bytes always produce the same records. A document
/// that cannot be parsed yields `Err(MalformedDocument)` and no records. A
/// document that parses but holds no sections yields an empty list and a
/// warning.
pub fn extract(
    document: &[u8],
    issue_date: NaiveDate,
    dialect: &Dialect,
) -> IngestResult<Vec<SectionRecord>> {
    let root = xml_tree::parse_document(document).map_err(|e| {
        tracing::error!(
            dialect = dialect.name(),
            issue_date = %issue_date,
            error = %e,
            "Document could not be parsed"
        );
        e
    })?;

    let records = match dialect {
        Dialect::Hierarchical => hierarchy::extract_sections(&root, issue_date),
        Dialect::FullTextByDate { ancestry, section } => {
            let record = full_text::extract_section(&root, issue_date, ancestry, section.as_deref());
            // A document with no text holds no section
            if record.content.is_empty() {
                Vec::new()
            } else {
                vec![record]
            }
        }
    };

    if records.is_empty() {
        tracing::warn!(
            dialect = dialect.name(),
            issue_date = %issue_date,
            root = %root.name,
            "No sections found in document; structure may differ from the expected hierarchy"
        );
    } else {
        tracing::debug!(
            dialect = dialect.name(),
            issue_date = %issue_date,
            sections = records.len(),
            "Extracted sections"
        );
    }

    Ok(records)
}
