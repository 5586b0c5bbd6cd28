//! Bulk hierarchical dialect
//!
//! Walks a full-title document depth first:
//! title (DIV1) → chapter (DIV3) → [subchapter (DIV4)] → part (DIV5) →
//! [subpart (DIV6, TYPE="SUBPART")] → section (DIV8)
//!
//! Optional levels are transparent when absent: parts are found directly
//! under a chapter, sections directly under a part. A `DIV6` that is not a
//! true subpart (subject groups and the like) is also transparent. Any other
//! wrapper element is walked through without touching the ancestry.
//!
//! The ancestry is set on entering a level and restored on leaving it, so an
//! optional level is cleared once its subtree is done and a later sibling
//! never sees it.

use crate::extractors::xml_tree::{join_normalized, NodeKind, XmlElement, HEADER_TAG};
use crate::types::{AncestryPath, HierarchyLevel, SectionRecord};
use chrono::NaiveDate;

/// Extract every section of a hierarchical document
pub(crate) fn extract_sections(root: &XmlElement, issue_date: NaiveDate) -> Vec<SectionRecord> {
    let mut walker = HierarchyWalker {
        issue_date,
        ancestry: AncestryPath::default(),
        part_depth: 0,
        records: Vec::new(),
    };
    walker.visit(root);
    walker.records
}

struct HierarchyWalker {
    issue_date: NaiveDate,
    ancestry: AncestryPath,
    /// Sections only count inside a part
    part_depth: usize,
    records: Vec<SectionRecord>,
}

impl HierarchyWalker {
    fn visit(&mut self, node: &XmlElement) {
        let level = match node.kind() {
            NodeKind::Section => {
                if self.part_depth > 0 {
                    let record = section_record(node, &self.ancestry, self.issue_date);
                    self.records.push(record);
                }
                return;
            }
            NodeKind::Title => HierarchyLevel::Title,
            NodeKind::Chapter => HierarchyLevel::Chapter,
            NodeKind::Subchapter => HierarchyLevel::Subchapter,
            NodeKind::Part => HierarchyLevel::Part,
            NodeKind::Subpart if node.is_true_subpart() => HierarchyLevel::Subpart,
            NodeKind::Subpart | NodeKind::Other => {
                self.visit_children(node);
                return;
            }
        };

        let previous = self
            .ancestry
            .enter(level, node.identifier().map(str::to_string));
        if level == HierarchyLevel::Part {
            self.part_depth += 1;
        }

        self.visit_children(node);

        if level == HierarchyLevel::Part {
            self.part_depth -= 1;
        }
        self.ancestry.leave(level, previous);
    }

    fn visit_children(&mut self, node: &XmlElement) {
        for child in node.children() {
            self.visit(child);
        }
    }
}

/// Build the record for one section node
///
/// Content is the header text followed by each other child element in
/// document order, fully flattened.
pub(crate) fn section_record(
    node: &XmlElement,
    ancestry: &AncestryPath,
    issue_date: NaiveDate,
) -> SectionRecord {
    let section = node.identifier().unwrap_or_default();
    SectionRecord::new(issue_date, ancestry, section, section_content(node))
}

pub(crate) fn section_content(node: &XmlElement) -> String {
    let header = node.header().map(XmlElement::flattened_text);
    let body = node
        .children()
        .iter()
        .filter(|c| c.name != HEADER_TAG)
        .map(XmlElement::flattened_text);

    let pieces: Vec<String> = header.into_iter().chain(body).collect();
    join_normalized(pieces.iter().map(String::as_str))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::xml_tree::parse_document;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 2, 13).unwrap()
    }

    fn extract(xml: &str) -> Vec<SectionRecord> {
        extract_sections(&parse_document(xml.as_bytes()).unwrap(), date())
    }

    #[test]
    fn test_sections_directly_under_part() {
        let records = extract(
            r#"<ECFR><DIV1 N="1"><DIV3 N="I"><DIV5 N="1">
                 <DIV8 N="1.1"><HEAD>§ 1.1 Purpose.</HEAD><P>Text.</P></DIV8>
               </DIV5></DIV3></DIV1></ECFR>"#,
        );

        assert_eq!(records.len(), 1);
        let r = &records[0];
        assert_eq!((r.title.as_str(), r.chapter.as_str(), r.part.as_str()), ("1", "I", "1"));
        assert_eq!(r.subchapter, None);
        assert_eq!(r.subpart, None);
        assert_eq!(r.section, "1.1");
        assert_eq!(r.content, "§ 1.1 Purpose. Text.");
        assert_eq!(r.word_count, 4);
    }

    #[test]
    fn test_subchapter_cleared_for_later_chapter() {
        let records = extract(
            r#"<DIV1 N="7">
                 <DIV3 N="I"><DIV4 N="A"><DIV5 N="1"><DIV8 N="1.1"/></DIV5></DIV4></DIV3>
                 <DIV3 N="II"><DIV5 N="200"><DIV8 N="200.1"/></DIV5></DIV3>
               </DIV1>"#,
        );

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].subchapter.as_deref(), Some("A"));
        assert_eq!(records[1].chapter, "II");
        assert_eq!(records[1].subchapter, None);
    }

    #[test]
    fn test_parts_outside_subchapter_do_not_inherit_it() {
        let records = extract(
            r#"<DIV1 N="7"><DIV3 N="I">
                 <DIV4 N="A"><DIV5 N="1"><DIV8 N="1.1"/></DIV5></DIV4>
                 <DIV5 N="2"><DIV8 N="2.1"/></DIV5>
               </DIV3></DIV1>"#,
        );

        assert_eq!(records[1].part, "2");
        assert_eq!(records[1].subchapter, None);
    }

    #[test]
    fn test_subpart_cleared_for_sibling_section() {
        let records = extract(
            r#"<DIV1 N="7"><DIV3 N="I"><DIV5 N="27">
                 <DIV6 N="A" TYPE="SUBPART"><DIV8 N="27.1"/></DIV6>
                 <DIV8 N="27.9"/>
                 <DIV6 N="B" TYPE="SUBPART"><DIV7 N="g" TYPE="SUBJGRP"><DIV8 N="27.20"/></DIV7></DIV6>
               </DIV5></DIV3></DIV1>"#,
        );

        let got: Vec<(&str, Option<&str>)> = records
            .iter()
            .map(|r| (r.section.as_str(), r.subpart.as_deref()))
            .collect();
        assert_eq!(
            got,
            vec![("27.1", Some("A")), ("27.9", None), ("27.20", Some("B"))]
        );
    }

    #[test]
    fn test_non_subpart_div6_is_transparent() {
        let records = extract(
            r#"<DIV1 N="7"><DIV3 N="I"><DIV5 N="27">
                 <DIV6 N="Scope" TYPE="SUBJGRP"><DIV8 N="27.1"/></DIV6>
               </DIV5></DIV3></DIV1>"#,
        );

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].subpart, None);
    }

    #[test]
    fn test_section_outside_part_is_ignored() {
        let records = extract(r#"<DIV1 N="7"><DIV3 N="I"><DIV8 N="stray"/></DIV3></DIV1>"#);
        assert!(records.is_empty());
    }

    #[test]
    fn test_empty_section_has_zero_words() {
        let records = extract(r#"<DIV1 N="7"><DIV3 N="I"><DIV5 N="1"><DIV8 N="1.1"></DIV8></DIV5></DIV3></DIV1>"#);
        assert_eq!(records[0].content, "");
        assert_eq!(records[0].word_count, 0);
    }

    #[test]
    fn test_section_own_text_outside_children_is_not_content() {
        let records = extract(
            r#"<DIV1 N="7"><DIV3 N="I"><DIV5 N="1"><DIV8 N="1.1">loose<HEAD>Head</HEAD>tail</DIV8></DIV5></DIV3></DIV1>"#,
        );
        assert_eq!(records[0].content, "Head");
    }

    #[test]
    fn test_header_comes_first_even_when_not_first_child() {
        let records = extract(
            r#"<DIV1 N="7"><DIV3 N="I"><DIV5 N="1"><DIV8 N="1.1"><P>Body.</P><HEAD>Head.</HEAD></DIV8></DIV5></DIV3></DIV1>"#,
        );
        assert_eq!(records[0].content, "Head. Body.");
    }
}
