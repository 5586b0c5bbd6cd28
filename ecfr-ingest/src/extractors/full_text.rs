//! Legacy "full-text-by-date" dialect
//!
//! A per-section document as returned by `full/{date}/title-N.xml?section=...`:
//! a single section node with a header, paragraphs and a citation trailer.
//! The document carries no usable ancestry, so the caller supplies it (from
//! the ancestry endpoint).

use crate::extractors::xml_tree::{join_normalized, NodeKind, XmlElement, CITATION_TAG, PARAGRAPH_TAG};
use crate::types::{AncestryPath, SectionRecord};
use chrono::NaiveDate;

/// Extract the single section of a full-text document
///
/// Content: header text, then each paragraph in document order, then the
/// citation trailer. The section identifier comes from the section node and
/// falls back to `section_hint`.
pub(crate) fn extract_section(
    root: &XmlElement,
    issue_date: NaiveDate,
    ancestry: &AncestryPath,
    section_hint: Option<&str>,
) -> SectionRecord {
    let node = root.first_of_kind(NodeKind::Section).unwrap_or(root);

    let section = node
        .identifier()
        .or(section_hint)
        .unwrap_or_default()
        .to_string();

    let mut pieces: Vec<String> = Vec::new();
    if let Some(header) = node.header() {
        pieces.push(header.flattened_text());
    }
    pieces.extend(node.descendants_named(PARAGRAPH_TAG).map(XmlElement::flattened_text));
    if let Some(citation) = node.find_descendant(CITATION_TAG) {
        pieces.push(citation.flattened_text());
    }

    let content = join_normalized(pieces.iter().map(String::as_str));
    SectionRecord::new(issue_date, ancestry, section, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::xml_tree::parse_document;

    fn ancestry() -> AncestryPath {
        AncestryPath {
            title: Some("12".into()),
            chapter: Some("II".into()),
            subchapter: Some("A".into()),
            part: Some("204".into()),
            subpart: None,
        }
    }

    #[test]
    fn test_header_paragraphs_then_citation() {
        let root = parse_document(
            br#"<DIV8 N="204.1" TYPE="SECTION">
                  <HEAD>&#xA7; 204.1 Authority.</HEAD>
                  <P>(a) This part is issued <I>under</I> section 11.</P>
                  <P>(b) Scope.</P>
                  <CITA>[Reg. D, 75 FR 1]</CITA>
                </DIV8>"#,
        )
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2019, 1, 3).unwrap();
        let record = extract_section(&root, date, &ancestry(), None);

        assert_eq!(record.section, "204.1");
        assert_eq!(record.title, "12");
        assert_eq!(record.subchapter.as_deref(), Some("A"));
        assert_eq!(
            record.content,
            "§ 204.1 Authority. (a) This part is issued under section 11. (b) Scope. [Reg. D, 75 FR 1]"
        );
    }

    #[test]
    fn test_section_hint_used_without_identifier() {
        let root = parse_document(b"<DIV8><P>Only text.</P></DIV8>").unwrap();
        let date = NaiveDate::from_ymd_opt(2019, 1, 3).unwrap();

        let record = extract_section(&root, date, &ancestry(), Some("204.9"));

        assert_eq!(record.section, "204.9");
        assert_eq!(record.content, "Only text.");
        assert_eq!(record.word_count, 2);
    }
}
